//! Serial Protocol Communication
//!
//! Line-oriented request/response protocol spoken by the DAQ board:
//! one UTF-8 command line out, one reply line back, the reply usually
//! carrying a JSON object with `ok`, `cmd`, `msg` and optional `data`.

mod client;
pub mod command;
mod error;
pub mod link;
mod response;
pub mod serial;
mod transport;

pub use client::Client;
pub use command::{verbs, Command};
pub use error::ProtocolError;
pub use link::{best_effort, Link, PortOpener, SystemPortOpener};
pub use response::{decode_line, Decoded, Response};
pub use serial::{list_ports, PortInfo};
pub use transport::{Channel, ConnectionParams, Transport};

/// Default baud rate for the DAQ board
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default reply timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

/// Delay after opening the port before the first command, in milliseconds.
/// Opening the port resets most boards.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 200;
