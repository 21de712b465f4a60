//! Runtime Configuration
//!
//! Process-wide settings for the pipeline's ambient concerns. Loaded from JSON
//! or built in code, then installed with [`Config::apply`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{Logger, Severity, Sink};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Lowest severity written by the logger
    pub min_severity: Severity,
    /// Log output stream
    pub sink: Sink,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warn,
            sink: Sink::Stderr,
        }
    }
}

impl Config {
    /// Config that logs every pipeline step
    pub fn verbose() -> Self {
        Self {
            min_severity: Severity::Trace,
            ..Self::default()
        }
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Install this configuration process-wide
    pub fn apply(&self) {
        Logger::set_min_severity(self.min_severity);
        Logger::set_sink(self.sink);
    }
}
