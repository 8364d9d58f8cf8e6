//! Console settings
//!
//! Persisted as pretty JSON. Missing fields take their defaults, so older
//! settings files keep loading after new options are added.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS};

/// Settings file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Last port used
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,

    /// Reply timeout for ordinary commands
    pub read_timeout_ms: u64,

    /// Delay after opening the port
    pub settle_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl ConnectionSettings {
    /// Reply timeout for ordinary commands
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Delay after opening the port
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Timing of the calibration and full-test workflows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Reply timeout for CALIBRATE (on-device averaging is slow)
    pub calibrate_timeout_ms: u64,

    /// Wait after TARE before prompting for the weight
    pub tare_settle_ms: u64,

    /// Reply timeout for each diagnostic step
    pub step_timeout_ms: u64,

    /// Reply timeout for START, STOP and LIST_FILES
    pub recording_timeout_ms: u64,

    /// Pause between full-test steps
    pub step_pause_ms: u64,

    /// Whether the full test records a file on the SD card unless told otherwise
    pub record_by_default: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            calibrate_timeout_ms: 15_000,
            tare_settle_ms: 200,
            step_timeout_ms: 3_000,
            recording_timeout_ms: 5_000,
            step_pause_ms: 200,
            record_by_default: true,
        }
    }
}

impl WorkflowSettings {
    /// Reply timeout for CALIBRATE
    pub fn calibrate_timeout(&self) -> Duration {
        Duration::from_millis(self.calibrate_timeout_ms)
    }

    /// Wait after TARE
    pub fn tare_settle(&self) -> Duration {
        Duration::from_millis(self.tare_settle_ms)
    }

    /// Reply timeout for a diagnostic step
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Reply timeout for START, STOP and LIST_FILES
    pub fn recording_timeout(&self) -> Duration {
        Duration::from_millis(self.recording_timeout_ms)
    }

    /// Pause between full-test steps
    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }
}

/// Everything the console remembers between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Serial link
    pub connection: ConnectionSettings,
    /// Workflow timings
    pub workflow: WorkflowSettings,
    /// Maximum retained events; unbounded when absent
    pub event_log_capacity: Option<usize>,
}

impl ConsoleSettings {
    /// Platform settings location, e.g. `~/.config/daq-console/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("daq-console").join("settings.json"))
    }

    /// Load settings from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load settings, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write settings to `path`, creating its directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
