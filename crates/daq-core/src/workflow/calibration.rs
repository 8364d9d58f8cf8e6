//! Guided load-cell calibration
//!
//! Idle -> (Taring) -> AwaitingWeightInput -> Calibrating -> Done | Failed.
//! Without a weight the run cancels back to Idle. Runs once; nothing is
//! retried or resumed.

use serde_json::Value;
use std::fmt;

use super::{NoticeLevel, Operator, WorkflowError};
use crate::config::WorkflowSettings;
use crate::events::EventSink;
use crate::protocol::{verbs, Client, Command, Response};

/// Where the calibration currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// Not started, or cancelled
    Idle,
    /// TARE sent, waiting for the scale to settle
    Taring,
    /// Waiting for the operator to enter the weight
    AwaitingWeightInput,
    /// CALIBRATE sent, waiting for the reply
    Calibrating,
    /// Board accepted the calibration
    Done,
    /// Rejected input, rejected calibration or failed exchange
    Failed,
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a calibration run ended
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// Operator gave no weight
    Cancelled,
    /// Board accepted the calibration
    Calibrated {
        /// Weight used, in grams
        grams: f64,
        /// The board's `data` payload
        data: Option<Value>,
    },
    /// Board rejected it, or the exchange failed
    Failed {
        /// Weight used, in grams
        grams: f64,
        /// Best available explanation
        message: String,
    },
}

/// Parse an operator-entered weight in grams.
///
/// Accepts positive finite numbers only.
pub fn parse_weight(input: &str) -> Result<f64, WorkflowError> {
    let invalid = |reason: &str| WorkflowError::Validation {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let grams: f64 = input
        .trim()
        .parse()
        .map_err(|_| invalid("not a number"))?;
    if !grams.is_finite() {
        return Err(invalid("not a finite number"));
    }
    if grams <= 0.0 {
        return Err(invalid("weight must be positive"));
    }
    Ok(grams)
}

/// One guided calibration run
pub struct Calibration<'a> {
    client: &'a Client,
    sink: &'a dyn EventSink,
    operator: &'a dyn Operator,
    settings: &'a WorkflowSettings,
    state: CalibrationState,
    history: Vec<CalibrationState>,
}

impl<'a> Calibration<'a> {
    /// Prepare a run; nothing is sent until [`run`](Self::run)
    pub fn new(
        client: &'a Client,
        sink: &'a dyn EventSink,
        operator: &'a dyn Operator,
        settings: &'a WorkflowSettings,
    ) -> Self {
        Self {
            client,
            sink,
            operator,
            settings,
            state: CalibrationState::Idle,
            history: vec![CalibrationState::Idle],
        }
    }

    /// Current state
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`
    pub fn history(&self) -> &[CalibrationState] {
        &self.history
    }

    fn enter(&mut self, next: CalibrationState) {
        tracing::debug!("calibration: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Drive the calibration to a terminal state
    pub fn run(&mut self) -> Result<CalibrationOutcome, WorkflowError> {
        if !self.client.is_connected() {
            self.operator
                .notify(NoticeLevel::Warning, "Not connected", "Connect to the board first");
            return Err(WorkflowError::NotConnected);
        }

        if self.operator.confirm("Tare now?", "Issue a TARE before calibration?") {
            self.enter(CalibrationState::Taring);
            self.tare();
        }

        self.enter(CalibrationState::AwaitingWeightInput);
        self.operator.notify(
            NoticeLevel::Info,
            "Place weight",
            "Place the known calibration weight on the scale, then continue.",
        );
        let input = self
            .operator
            .prompt("Known weight (g)", "Enter known weight in grams:")
            .filter(|s| !s.trim().is_empty());
        let Some(input) = input else {
            self.enter(CalibrationState::Idle);
            self.operator.notify(
                NoticeLevel::Info,
                "Cancelled",
                "Calibration cancelled (no weight provided).",
            );
            return Ok(CalibrationOutcome::Cancelled);
        };

        let grams = match parse_weight(&input) {
            Ok(g) => g,
            Err(e) => {
                self.enter(CalibrationState::Failed);
                self.operator.notify(
                    NoticeLevel::Error,
                    "Invalid value",
                    "Please enter a valid positive number in grams.",
                );
                return Err(e);
            }
        };

        self.enter(CalibrationState::Calibrating);
        let command = Command::calibrate(grams);
        self.sink.append_plain(&format!(">>> {command}"));
        let outcome = match self
            .client
            .send_command(&command, Some(self.settings.calibrate_timeout()))
        {
            Ok(resp) => {
                self.sink.append_response(&resp);
                judge(grams, &resp)
            }
            Err(e) => {
                self.sink.append_failure(&command.to_string(), &e);
                CalibrationOutcome::Failed {
                    grams,
                    message: e.to_string(),
                }
            }
        };

        match &outcome {
            CalibrationOutcome::Calibrated { data, .. } => {
                self.enter(CalibrationState::Done);
                let shown = data
                    .as_ref()
                    .and_then(|d| serde_json::to_string_pretty(d).ok())
                    .unwrap_or_else(|| "null".to_string());
                self.operator.notify(
                    NoticeLevel::Info,
                    "Calibration success",
                    &format!("Calibration result:\n{shown}"),
                );
            }
            CalibrationOutcome::Failed { message, .. } => {
                self.enter(CalibrationState::Failed);
                self.operator
                    .notify(NoticeLevel::Error, "Calibration failed", message);
            }
            CalibrationOutcome::Cancelled => {}
        }
        tracing::info!("calibration finished in state {}", self.state);
        Ok(outcome)
    }

    /// TARE is advisory: a failure is logged and calibration continues.
    fn tare(&mut self) {
        let command = Command::new(verbs::TARE);
        self.sink.append_plain(&format!(">>> {command}"));
        match self.client.send_command(&command, None) {
            Ok(resp) => self.sink.append_response(&resp),
            Err(e) => {
                tracing::warn!("tare failed: {e}");
                self.sink.append_failure(verbs::TARE, &e);
            }
        }
        std::thread::sleep(self.settings.tare_settle());
    }
}

fn judge(grams: f64, resp: &Response) -> CalibrationOutcome {
    match resp.ok() {
        Some(true) => CalibrationOutcome::Calibrated {
            grams,
            data: resp.data().cloned(),
        },
        Some(false) => CalibrationOutcome::Failed {
            grams,
            message: resp.msg().unwrap_or("device reported failure").to_string(),
        },
        None if resp.is_structured() => CalibrationOutcome::Failed {
            grams,
            message: format!("reply has no ok flag: {}", resp.raw()),
        },
        None => CalibrationOutcome::Failed {
            grams,
            message: format!("unstructured response: {}", resp.raw()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight_accepts_positive() {
        assert_eq!(parse_weight("500.0").unwrap(), 500.0);
        assert_eq!(parse_weight(" 12.5 ").unwrap(), 12.5);
        assert_eq!(parse_weight("1e3").unwrap(), 1000.0);
    }

    #[test]
    fn test_parse_weight_rejects_bad_input() {
        for input in ["0", "-5", "abc", "", "inf", "NaN", "-0"] {
            assert!(
                matches!(parse_weight(input), Err(WorkflowError::Validation { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_judge_outcomes() {
        let ok = Response::from_line(r#"{"ok":true,"cmd":"CALIBRATE","msg":"done","data":{"factor":2.5}}"#);
        assert_eq!(
            judge(500.0, &ok),
            CalibrationOutcome::Calibrated {
                grams: 500.0,
                data: Some(serde_json::json!({"factor": 2.5})),
            }
        );

        let rejected = Response::from_line(r#"{"ok":false,"cmd":"CALIBRATE","msg":"unstable"}"#);
        assert_eq!(
            judge(500.0, &rejected),
            CalibrationOutcome::Failed {
                grams: 500.0,
                message: "unstable".to_string(),
            }
        );

        let text = Response::from_line("calibrating...");
        match judge(1.0, &text) {
            CalibrationOutcome::Failed { message, .. } => assert!(message.contains("unstructured")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
