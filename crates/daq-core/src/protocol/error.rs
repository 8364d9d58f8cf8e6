//! Protocol errors

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the device
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port not open")]
    NotConnected,

    #[error("Failed to open {port}: {reason}")]
    ConnectionFailed { port: String, reason: String },

    #[error("No response within {:.1}s for command: {command}", elapsed.as_secs_f64())]
    Timeout { command: String, elapsed: Duration },

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True for the no-reply case, as opposed to a broken link
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Timeout { .. })
    }
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        ProtocolError::SerialError(e.to_string())
    }
}
