//! Multi-step workflows
//!
//! Scripted command sequences layered on the [`Client`](crate::protocol::Client):
//! guided load-cell calibration and the full automated system test. Both
//! block the calling thread and are normally run by the
//! [`Dispatcher`](crate::dispatch::Dispatcher).

mod calibration;

pub use calibration::{parse_weight, Calibration, CalibrationOutcome, CalibrationState};
pub use full_test::{FullTest, FullTestReport, PlanItem, StepOutcome, TestStep};

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Errors that stop a workflow before or while it runs
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The transport is closed
    #[error("Connect to the board first")]
    NotConnected,

    /// Operator input was rejected before anything was sent
    #[error("Invalid value '{input}': {reason}")]
    Validation {
        /// Text as entered
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Link failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Severity of an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress or success
    Info,
    /// Something the operator should fix
    Warning,
    /// The step failed
    Error,
}

/// The person at the console, as seen by a workflow.
///
/// Implemented by the presentation layer. Calls come from the worker thread
/// and may block until the operator answers.
pub trait Operator: Send + Sync {
    /// Yes/no question
    fn confirm(&self, title: &str, question: &str) -> bool;

    /// Free-text question; `None` when the operator dismisses it
    fn prompt(&self, title: &str, question: &str) -> Option<String>;

    /// One-way message
    fn notify(&self, level: NoticeLevel, title: &str, message: &str);
}
