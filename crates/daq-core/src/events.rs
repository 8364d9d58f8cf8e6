//! Event log
//!
//! Ordered, append-only record of what happened on the link: operator notes,
//! device responses and failures. The presentation layer reads it through
//! [`EventLog::snapshot`] or follows it live with [`EventLog::subscribe`].

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::protocol::{ProtocolError, Response};

/// What an event records
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Free-form note
    Note(String),
    /// A reply from the device
    Response(Response),
    /// A command that produced no usable reply
    Failure {
        /// Command text as sent
        command: String,
        /// Error description
        error: String,
    },
}

/// A timestamped log entry
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Local wall-clock time the event was appended
    pub timestamp: DateTime<Local>,
    /// Payload
    pub kind: EventKind,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
        }
    }

    /// First line of the rendered event, without the timestamp
    pub fn headline(&self) -> String {
        match &self.kind {
            EventKind::Note(text) => text.clone(),
            EventKind::Response(resp) => resp
                .summary()
                .unwrap_or_else(|| format!("RAW: {}", resp.raw())),
            EventKind::Failure { command, error } => format!("{command} | ERROR: {error}"),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        write!(f, "{ts} | {}", self.headline())?;
        if let EventKind::Response(resp) = &self.kind {
            if let Some(pretty) = resp.pretty() {
                write!(f, "\n{pretty}")?;
            }
        }
        Ok(())
    }
}

/// Destination for events produced by the client's callers and workflows
pub trait EventSink: Send + Sync {
    /// Append an event
    fn append(&self, event: Event);

    /// Append a plain text note
    fn append_plain(&self, text: &str) {
        self.append(Event::now(EventKind::Note(text.to_string())));
    }

    /// Append a device response
    fn append_response(&self, response: &Response) {
        self.append(Event::now(EventKind::Response(response.clone())));
    }

    /// Append a failed command
    fn append_failure(&self, command: &str, error: &ProtocolError) {
        self.append(Event::now(EventKind::Failure {
            command: command.to_string(),
            error: error.to_string(),
        }));
    }
}

#[derive(Default)]
struct LogInner {
    events: VecDeque<Event>,
    capacity: Option<usize>,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
}

/// In-memory event log. Clones share the same log.
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<LogInner>>,
}

impl EventLog {
    /// Create an unbounded log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that drops its oldest entries beyond `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        let log = Self::default();
        log.lock().capacity = Some(capacity.max(1));
        log
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every event appended from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Copy of the retained events, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().events.iter().cloned().collect()
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Drop all retained events
    pub fn clear(&self) {
        self.lock().events.clear();
    }
}

impl EventSink for EventLog {
    fn append(&self, event: Event) {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if let Some(cap) = inner.capacity {
            while inner.events.len() >= cap {
                inner.events.pop_front();
            }
        }
        inner.events.push_back(event);
    }
}
