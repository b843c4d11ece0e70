//! Configuration schema definitions.
//!
//! # Example
//!
//! ```yaml
//! client:
//!   api_timeout_secs: 10
//! updates:
//!   buffer_size: 256
//!   skip_meta_events: true
//! logging:
//!   level: debug
//!   format: pretty
//!   filters:
//!     qqbot::client: trace
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use qqbot::{ClientConfig, UpdatesConfig};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QqBotConfig {
    pub client: ClientConfig,
    pub updates: UpdatesConfig,
    pub logging: LoggingConfig,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level for every target.
    pub level: LogLevel,

    pub format: LogFormat,

    /// Per-module overrides, e.g. `qqbot::client: trace`.
    pub filters: HashMap<String, LogLevel>,

    /// Include thread IDs in each line.
    pub thread_ids: bool,

    /// Include source file and line in each line.
    pub file_location: bool,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Newline-delimited JSON. Needs the `json-log` feature; falls back to
    /// `Full` without it.
    Json,
}
