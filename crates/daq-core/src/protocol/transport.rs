//! Connection ownership
//!
//! The [`Transport`] owns zero or one open link. Every physical operation
//! (open, close, and the client's write/read exchange) happens under one
//! mutex, so at most one thread touches the channel at a time.
//!
//! `close()` takes the same lock as a pending exchange; closing while a
//! command waits for its reply blocks until that read returns or times out.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::link::{best_effort, Link, PortOpener, SystemPortOpener};
use super::{ProtocolError, DEFAULT_SETTLE_DELAY_MS};

/// Parameters of the open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Serial port name
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout the link was opened with
    pub timeout: Duration,
}

/// An open link plus the parameters it was opened with
pub struct Channel {
    params: ConnectionParams,
    link: Box<dyn Link>,
}

impl Channel {
    /// Parameters this channel was opened with
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// The underlying link
    pub fn link(&mut self) -> &mut dyn Link {
        self.link.as_mut()
    }
}

/// Exclusive owner of the device connection
pub struct Transport {
    opener: Arc<dyn PortOpener>,
    settle_delay: Duration,
    channel: Mutex<Option<Channel>>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(Arc::new(SystemPortOpener))
    }
}

impl Transport {
    /// Create a closed transport that opens links through `opener`
    pub fn new(opener: Arc<dyn PortOpener>) -> Self {
        Self {
            opener,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            channel: Mutex::new(None),
        }
    }

    /// Override the delay applied after a successful open
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<Channel>> {
        // A panic mid-exchange leaves the Option itself intact.
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open `port`, replacing any existing connection.
    ///
    /// Sleeps for the settle delay before returning so the first command
    /// does not race the board's reset after the port toggles DTR.
    pub fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<(), ProtocolError> {
        let mut guard = self.lock();
        if let Some(previous) = guard.take() {
            tracing::info!("closing {} before reopening", previous.params.port);
            shutdown(previous);
        }

        let link = self.opener.open(port, baud_rate, timeout)?;
        std::thread::sleep(self.settle_delay);

        tracing::info!("connected to {port} @ {baud_rate}");
        *guard = Some(Channel {
            params: ConnectionParams {
                port: port.to_string(),
                baud_rate,
                timeout,
            },
            link,
        });
        Ok(())
    }

    /// Close the connection. Safe to call when already closed.
    pub fn close(&self) {
        if let Some(channel) = self.lock().take() {
            tracing::info!("disconnected from {}", channel.params.port);
            shutdown(channel);
        }
    }

    /// Whether a live connection exists
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Parameters of the current connection, if open
    pub fn params(&self) -> Option<ConnectionParams> {
        self.lock().as_ref().map(|c| c.params.clone())
    }

    /// Run `f` with exclusive access to the open channel.
    ///
    /// Fails with [`ProtocolError::NotConnected`] without calling `f` when
    /// the transport is closed.
    pub fn with_channel<R>(
        &self,
        f: impl FnOnce(&mut Channel) -> Result<R, ProtocolError>,
    ) -> Result<R, ProtocolError> {
        let mut guard = self.lock();
        let channel = guard.as_mut().ok_or(ProtocolError::NotConnected)?;
        f(channel)
    }
}

fn shutdown(mut channel: Channel) {
    best_effort("flush on close", channel.link.flush());
    drop(channel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullLink;

    impl Read for NullLink {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::TimedOut.into())
        }
    }

    impl Write for NullLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    impl Link for NullLink {
        fn timeout(&self) -> Duration {
            Duration::ZERO
        }
        fn set_timeout(&mut self, _timeout: Duration) -> Result<(), ProtocolError> {
            Ok(())
        }
        fn clear_input(&mut self) -> Result<(), ProtocolError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingOpener {
        opened: AtomicUsize,
    }

    impl PortOpener for CountingOpener {
        fn open(&self, port: &str, _baud: u32, _timeout: Duration) -> Result<Box<dyn Link>, ProtocolError> {
            if port == "missing" {
                return Err(ProtocolError::ConnectionFailed {
                    port: port.to_string(),
                    reason: "no such device".to_string(),
                });
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullLink))
        }
    }

    fn transport(opener: Arc<CountingOpener>) -> Transport {
        Transport::new(opener).with_settle_delay(Duration::ZERO)
    }

    #[test]
    fn test_starts_closed() {
        let t = transport(Arc::default());
        assert!(!t.is_open());
        assert!(t.params().is_none());
        let err = t.with_channel(|_| Ok(())).unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
    }

    #[test]
    fn test_open_then_close() {
        let t = transport(Arc::default());
        t.open("ttyTEST", 9600, Duration::from_secs(1)).unwrap();
        assert!(t.is_open());
        assert_eq!(
            t.params(),
            Some(ConnectionParams {
                port: "ttyTEST".to_string(),
                baud_rate: 9600,
                timeout: Duration::from_secs(1),
            })
        );

        // flush fails on NullLink; close still ends closed
        t.close();
        assert!(!t.is_open());
        t.close();
        assert!(!t.is_open());
    }

    #[test]
    fn test_reopen_replaces_connection() {
        let opener = Arc::new(CountingOpener::default());
        let t = transport(opener.clone());
        t.open("a", 115200, Duration::from_secs(1)).unwrap();
        t.open("b", 115200, Duration::from_secs(1)).unwrap();
        assert_eq!(opener.opened.load(Ordering::SeqCst), 2);
        assert_eq!(t.params().unwrap().port, "b");
    }

    #[test]
    fn test_failed_open_leaves_closed() {
        let t = transport(Arc::default());
        t.open("a", 115200, Duration::from_secs(1)).unwrap();
        let err = t.open("missing", 115200, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionFailed { .. }));
        assert!(!t.is_open());
    }

    #[test]
    fn test_settle_delay_applied() {
        let t = Transport::new(Arc::new(CountingOpener::default()))
            .with_settle_delay(Duration::from_millis(50));
        let start = std::time::Instant::now();
        t.open("a", 115200, Duration::from_secs(1)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
