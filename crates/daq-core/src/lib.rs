//! # DAQ Core Library
//!
//! Core functionality for the DAQ operator console.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial transport with exclusive access to a single connection
//! - Line-based command/response client with JSON reply decoding
//! - Guided load-cell calibration and the full automated system test
//! - An event log for the presentation layer
//! - A single-worker dispatcher so callers never block on the link
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use daq_core::protocol::{Client, Transport};
//!
//! let transport = Arc::new(Transport::default());
//! transport.open("/dev/ttyACM0", 115200, Duration::from_secs(5))?;
//!
//! let client = Client::new(transport);
//! let resp = client.send("PING", Some(Duration::from_secs(3)))?;
//! println!("{}", resp.summary().unwrap_or_else(|| resp.raw().to_string()));
//! ```

pub mod config;
pub mod dispatch;
pub mod events;
pub mod protocol;
pub mod workflow;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConnectionSettings, ConsoleSettings, WorkflowSettings};
    pub use crate::dispatch::Dispatcher;
    pub use crate::events::{Event, EventKind, EventLog, EventSink};
    pub use crate::protocol::{Client, Command, ProtocolError, Response, Transport};
    pub use crate::workflow::{CalibrationOutcome, NoticeLevel, Operator, WorkflowError};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
