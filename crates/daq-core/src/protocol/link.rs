//! Physical link abstraction
//!
//! The transport never touches `serialport` directly. It holds a boxed
//! [`Link`] produced by a [`PortOpener`], which keeps the request/response
//! logic testable against a scripted device.

use serialport::{ClearBuffer, SerialPort};
use std::fmt::Display;
use std::io::{Read, Write};
use std::time::Duration;

use super::serial::open_port;
use super::ProtocolError;

/// A byte stream with a configurable read timeout
pub trait Link: Read + Write + Send {
    /// Current read timeout
    fn timeout(&self) -> Duration;

    /// Change the read timeout used by subsequent reads
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError>;

    /// Discard bytes received but not yet read
    fn clear_input(&mut self) -> Result<(), ProtocolError>;
}

impl Link for Box<dyn SerialPort> {
    fn timeout(&self) -> Duration {
        SerialPort::timeout(&**self)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        SerialPort::set_timeout(&mut **self, timeout)?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        SerialPort::clear(&mut **self, ClearBuffer::Input)?;
        Ok(())
    }
}

/// Creates links for the transport
pub trait PortOpener: Send + Sync {
    /// Open `port` at `baud_rate` with `timeout` as the initial read timeout
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn Link>, ProtocolError>;
}

/// Opens real serial ports through the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn Link>, ProtocolError> {
        let serial = open_port(port, baud_rate, timeout)?;
        Ok(Box::new(serial))
    }
}

/// Run an operation whose failure must never propagate.
///
/// Failures are logged at debug level; the return value says whether the
/// operation succeeded.
pub fn best_effort<T, E: Display>(what: &str, result: Result<T, E>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("best-effort {what} failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_effort_reports_status() {
        assert!(best_effort("noop", Ok::<(), String>(())));
        assert!(!best_effort("clear", Err::<(), _>("unsupported")));
    }
}
