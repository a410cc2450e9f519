//! Bus configuration
//!
//! All fields are optional in JSON; a missing file section falls back to the
//! defaults below.

use crate::error::{BusError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a [`Bus`](crate::Bus)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    /// Buffer dispatched events until `start()` is called
    ///
    /// When false the bus is started at construction.
    #[serde(default)]
    pub delayed_start: bool,

    /// Maximum number of buffered events (0 = unbounded)
    ///
    /// On overflow the oldest buffered event is dropped.
    #[serde(default)]
    pub max_pending: usize,

    /// Diagnostic trace log (disabled when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceConfig>,
}

/// JSON-lines trace log settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    /// Trace file path
    pub path: PathBuf,

    /// Append to an existing file instead of truncating it
    #[serde(default)]
    pub append: bool,
}

impl BusConfig {
    /// Default configuration with buffering enabled
    pub fn delayed() -> Self {
        Self {
            delayed_start: true,
            ..Default::default()
        }
    }

    /// Enable the trace log at `path`
    pub fn with_trace(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace = Some(TraceConfig {
            path: path.into(),
            append: false,
        });
        self
    }

    /// Cap the pending queue
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BusError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            delayed_start = config.delayed_start,
            trace = config.trace.is_some(),
            "Bus config loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(trace) = &self.trace {
            if trace.path.as_os_str().is_empty() {
                return Err(BusError::Config("trace.path must not be empty".to_string()));
            }
        }
        Ok(())
    }
}
