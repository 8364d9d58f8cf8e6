//! Background command execution
//!
//! The presentation layer never blocks on the serial link. It submits jobs
//! to a [`Dispatcher`], whose single worker runs them one at a time on
//! Tokio's blocking pool and reports back over oneshot channels. Because
//! the worker awaits each job before taking the next, jobs submitted here
//! run strictly in submission order.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::config::WorkflowSettings;
use crate::events::EventSink;
use crate::protocol::{Client, ProtocolError, Response};
use crate::workflow::{Calibration, CalibrationOutcome, FullTest, FullTestReport, Operator, WorkflowError};

/// Completion handle for a submitted command
pub type CommandReceipt = oneshot::Receiver<Result<Response, ProtocolError>>;

/// Completion handle for a calibration run
pub type CalibrationReceipt = oneshot::Receiver<Result<CalibrationOutcome, WorkflowError>>;

/// Completion handle for a full test run
pub type FullTestReceipt = oneshot::Receiver<Result<FullTestReport, WorkflowError>>;

enum Job {
    Command {
        command: String,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<Response, ProtocolError>>,
    },
    Calibrate {
        operator: Arc<dyn Operator>,
        reply: oneshot::Sender<Result<CalibrationOutcome, WorkflowError>>,
    },
    FullTest {
        record: bool,
        reply: oneshot::Sender<Result<FullTestReport, WorkflowError>>,
    },
}

impl Job {
    fn label(&self) -> String {
        match self {
            Job::Command { command, .. } => command.clone(),
            Job::Calibrate { .. } => "calibration".to_string(),
            Job::FullTest { .. } => "full test".to_string(),
        }
    }
}

struct Worker {
    client: Arc<Client>,
    sink: Arc<dyn EventSink>,
    settings: WorkflowSettings,
}

impl Worker {
    fn run(&self, job: Job) {
        // A dropped receiver only means nobody waits for the result.
        match job {
            Job::Command {
                command,
                timeout,
                reply,
            } => {
                let _ = reply.send(self.command(&command, timeout));
            }
            Job::Calibrate { operator, reply } => {
                let result =
                    Calibration::new(&self.client, self.sink.as_ref(), operator.as_ref(), &self.settings).run();
                if let Err(e) = &result {
                    self.sink.append_plain(&format!("Calibration aborted: {e}"));
                }
                let _ = reply.send(result);
            }
            Job::FullTest { record, reply } => {
                let result = FullTest::new(&self.client, self.sink.as_ref(), &self.settings, record).run();
                if let Err(e) = &result {
                    self.sink.append_plain(&format!("Full test aborted: {e}"));
                }
                let _ = reply.send(result);
            }
        }
    }

    fn command(&self, command: &str, timeout: Option<Duration>) -> Result<Response, ProtocolError> {
        let command = command.trim();
        self.sink.append_plain(&format!(">>> {command}"));
        let result = self.client.send(command, timeout);
        match &result {
            Ok(resp) => self.sink.append_response(resp),
            Err(e) => self.sink.append_failure(command, e),
        }
        result
    }
}

/// Single-worker job queue in front of a [`Client`]
#[derive(Clone)]
pub struct Dispatcher {
    jobs: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Start the worker on `runtime`
    pub fn spawn(
        runtime: &Handle,
        client: Arc<Client>,
        sink: Arc<dyn EventSink>,
        settings: WorkflowSettings,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let worker = Arc::new(Worker {
            client,
            sink,
            settings,
        });

        runtime.spawn(async move {
            while let Some(job) = rx.recv().await {
                let label = job.label();
                let worker = Arc::clone(&worker);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.run(job)).await {
                    tracing::error!("job '{label}' did not complete: {e}");
                }
            }
            tracing::debug!("dispatcher queue closed");
        });

        Self { jobs: tx }
    }

    fn submit<T>(&self, job: Job, rx: oneshot::Receiver<T>) -> oneshot::Receiver<T> {
        if self.jobs.send(job).is_err() {
            tracing::warn!("dispatcher worker has stopped; job dropped");
        }
        rx
    }

    /// Queue one command. The result is also logged to the event sink.
    pub fn send(&self, command: impl Into<String>, timeout: Option<Duration>) -> CommandReceipt {
        let (reply, rx) = oneshot::channel();
        self.submit(
            Job::Command {
                command: command.into(),
                timeout,
                reply,
            },
            rx,
        )
    }

    /// Queue a guided calibration
    pub fn calibrate(&self, operator: Arc<dyn Operator>) -> CalibrationReceipt {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Calibrate { operator, reply }, rx)
    }

    /// Queue the full automated test
    pub fn full_test(&self, record: bool) -> FullTestReceipt {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::FullTest { record, reply }, rx)
    }
}
