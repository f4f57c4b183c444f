//! Common configuration types for the calling harness crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable single-line output.
    #[default]
    Plain,
    /// One JSON object per event.
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default filter directive, used when `RUST_LOG` is not set
    pub default_filter: String,
    /// Log output format
    pub format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ObservabilityConfigError {
    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

impl ObservabilityConfig {
    /// Create a plain-text configuration with the given default filter.
    #[must_use]
    pub fn new(default_filter: impl Into<String>) -> Self {
        Self {
            default_filter: default_filter.into(),
            format: LogFormat::Plain,
        }
    }

    /// Load from a variable map, reading `LOG_FORMAT` (`plain` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ObservabilityConfigError::InvalidLogFormat` for any other value.
    pub fn from_vars(
        default_filter: impl Into<String>,
        vars: &HashMap<String, String>,
    ) -> Result<Self, ObservabilityConfigError> {
        let format = match vars.get("LOG_FORMAT").map(|v| v.trim().to_ascii_lowercase()) {
            None => LogFormat::Plain,
            Some(v) if v == "plain" => LogFormat::Plain,
            Some(v) if v == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ObservabilityConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'plain' or 'json', got '{other}'"
                )))
            }
        };

        Ok(Self {
            default_filter: default_filter.into(),
            format,
        })
    }
}
