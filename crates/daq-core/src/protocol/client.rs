//! Command/response client
//!
//! One command line out, one reply line back. The whole exchange runs under
//! the transport lock, so replies cannot be stolen by a concurrent caller.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::link::{best_effort, Link};
use super::{Command, ProtocolError, Response, Transport, DEFAULT_READ_TIMEOUT_MS};

/// Request/response layer over a shared [`Transport`]
pub struct Client {
    transport: Arc<Transport>,
    default_timeout: Duration,
}

impl Client {
    /// Create a client using the default read timeout
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            default_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }

    /// Override the timeout used when `send` is given none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Timeout used when `send` is given none
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The transport this client talks through
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Whether the transport has a live connection
    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    /// Send a typed command
    pub fn send_command(
        &self,
        command: &Command,
        timeout: Option<Duration>,
    ) -> Result<Response, ProtocolError> {
        self.send(&command.to_string(), timeout)
    }

    /// Send one command line and wait for one reply line.
    ///
    /// Blocks until the reply arrives or `timeout` (or the client default)
    /// elapses. A reply that is not JSON is still a success; only the
    /// decoded part is absent.
    pub fn send(&self, command: &str, timeout: Option<Duration>) -> Result<Response, ProtocolError> {
        let command = command.trim();
        let timeout = timeout.unwrap_or(self.default_timeout);

        self.transport.with_channel(|channel| {
            let link = channel.link();
            best_effort("clear input buffer", link.clear_input());

            let mut frame = Vec::with_capacity(command.len() + 1);
            frame.extend_from_slice(command.as_bytes());
            frame.push(b'\n');
            link.write_all(&frame)?;
            best_effort("flush", link.flush());
            tracing::debug!("TX: {command}");

            let started = Instant::now();
            let raw = {
                let mut scoped = TimeoutOverride::apply(link, timeout)?;
                read_line(scoped.link(), timeout)?
            };

            if raw.is_empty() {
                return Err(ProtocolError::Timeout {
                    command: command.to_string(),
                    elapsed: started.elapsed(),
                });
            }

            let line = String::from_utf8_lossy(&raw);
            tracing::debug!("RX: {}", line.trim());
            Ok(Response::from_line(line))
        })
    }
}

/// Restores the link's read timeout when dropped, on every exit path.
struct TimeoutOverride<'a> {
    link: &'a mut dyn Link,
    previous: Duration,
}

impl<'a> TimeoutOverride<'a> {
    fn apply(link: &'a mut dyn Link, timeout: Duration) -> Result<Self, ProtocolError> {
        let previous = link.timeout();
        link.set_timeout(timeout)?;
        Ok(Self { link, previous })
    }

    fn link(&mut self) -> &mut dyn Link {
        &mut *self.link
    }
}

impl Drop for TimeoutOverride<'_> {
    fn drop(&mut self) {
        best_effort("restore read timeout", self.link.set_timeout(self.previous));
    }
}

/// Read bytes until a newline or until `timeout` has elapsed.
///
/// The link timeout is narrowed to the remaining budget before every read so
/// the whole call stays within `timeout`. Returns whatever arrived, which is
/// empty when the device stayed silent.
fn read_line(link: &mut dyn Link, timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
    let start = Instant::now();
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let remaining = match timeout.checked_sub(start.elapsed()) {
            Some(r) if !r.is_zero() => r,
            _ => break,
        };
        link.set_timeout(remaining)?;

        match link.read(&mut byte) {
            // Nothing buffered yet on some drivers.
            Ok(0) => std::thread::sleep(Duration::from_millis(1)),
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }

    Ok(line)
}
