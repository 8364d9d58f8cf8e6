//! Device commands
//!
//! A command is a verb plus an optional argument, sent as one text line.
//! The client is verb-agnostic; the constants below are the board's
//! conventional vocabulary.

use std::fmt;

/// Verbs understood by the DAQ firmware
pub mod verbs {
    /// Liveness check
    pub const PING: &str = "PING";
    /// Board status summary
    pub const STATUS: &str = "STATUS";
    /// One sensor sample
    pub const READ: &str = "READ";
    /// Temperature sensor self-test
    pub const TEST_TEMP: &str = "TEST_TEMP";
    /// Pressure sensor self-test
    pub const TEST_PRESSURE: &str = "TEST_PRESSURE";
    /// List recordings on the SD card
    pub const LIST_FILES: &str = "LIST_FILES";
    /// Start recording to the SD card
    pub const START: &str = "START";
    /// Stop recording
    pub const STOP: &str = "STOP";
    /// Set LED brightness (0-255)
    pub const SET_LED: &str = "SET_LED";
    /// Read LED brightness
    pub const GET_LED: &str = "GET_LED";
    /// Zero the load cell
    pub const TARE: &str = "TARE";
    /// Calibrate the load cell against a known weight in grams
    pub const CALIBRATE: &str = "CALIBRATE";
}

/// An outbound request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    arg: Option<String>,
}

impl Command {
    /// A bare verb with no argument
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into().trim().to_string(),
            arg: None,
        }
    }

    /// A verb with a single argument
    pub fn with_arg(verb: impl Into<String>, arg: impl fmt::Display) -> Self {
        let arg = arg.to_string().trim().to_string();
        Self {
            arg: (!arg.is_empty()).then_some(arg),
            ..Self::new(verb)
        }
    }

    /// Split free-form operator text into verb and argument.
    ///
    /// Everything after the first run of whitespace is kept as the argument.
    pub fn parse(text: &str) -> Self {
        match text.trim().split_once(char::is_whitespace) {
            Some((verb, arg)) => Self::with_arg(verb, arg),
            None => Self::new(text),
        }
    }

    /// `SET_LED <level>`
    pub fn set_led(level: u8) -> Self {
        Self::with_arg(verbs::SET_LED, level)
    }

    /// `CALIBRATE <grams>`
    pub fn calibrate(grams: f64) -> Self {
        Self::with_arg(verbs::CALIBRATE, format_weight(grams))
    }

    /// Command verb
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Optional argument
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }

    /// The line as written to the wire, newline included
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_string().into_bytes();
        bytes.push(b'\n');
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{} {}", self.verb, arg),
            None => f.write_str(&self.verb),
        }
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::parse(text)
    }
}

/// Render grams the way the firmware parser expects: whole numbers keep one
/// decimal place ("500.0"), fractions print in shortest form ("0.25").
pub fn format_weight(grams: f64) -> String {
    if grams.fract() == 0.0 && grams.abs() < 1e15 {
        format!("{grams:.1}")
    } else {
        grams.to_string()
    }
}
