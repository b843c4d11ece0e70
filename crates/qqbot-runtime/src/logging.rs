//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use qqbot_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use qqbot_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("qqbot::client=trace")
//!     .init();
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level. Per-module
//! directives are added on top either way.

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// A builder for configuring logging.
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    format: LogFormat,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            with_target: true,
            ..Default::default()
        }
    }

    /// Creates a builder from a [`LoggingConfig`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.level.to_tracing_level())
            .format(config.format)
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location);

        // Sorted so the resulting filter does not depend on map order.
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in filters {
            builder = builder.directive(&format!("{module}={level}"));
        }

        builder
    }

    /// Sets the base log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive such as `qqbot::updates=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Returns the filter directives, base level first.
    fn filter_directives(&self) -> Vec<String> {
        let base = self.level.unwrap_or(tracing::Level::INFO);
        std::iter::once(base.to_string().to_lowercase())
            .chain(self.directives.iter().cloned())
            .collect()
    }

    fn build_filter(&self) -> EnvFilter {
        let mut directives = self.filter_directives().into_iter();
        let base = directives.next().unwrap_or_default();

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
        for directive in directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    /// Initializes the logging system, ignoring an existing subscriber.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Initializes the logging system.
    ///
    /// # Errors
    /// Fails when a global subscriber is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();

        macro_rules! configure_layer {
            ($layer:expr) => {
                $layer
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
            };
        }

        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer()))
                .with(filter)
                .try_init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer().compact()))
                .with(filter)
                .try_init(),
            LogFormat::Full => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer()))
                .with(filter)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer().pretty()))
                .with(filter)
                .try_init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Pretty,
            thread_ids: true,
            file_location: true,
            ..LoggingConfig::default()
        };
        config.filters.insert("qqbot::updates".into(), LogLevel::Trace);
        config.filters.insert("qqbot::client".into(), LogLevel::Debug);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.with_thread_ids && builder.with_file && builder.with_line_number);
        assert_eq!(
            builder.filter_directives(),
            vec!["warn", "qqbot::client=debug", "qqbot::updates=trace"]
        );
    }

    #[test]
    fn test_default_level() {
        let builder = LoggingBuilder::new().directive("qqbot=debug");
        assert!(builder.with_target);
        assert_eq!(builder.filter_directives(), vec!["info", "qqbot=debug"]);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_from_config(&LoggingConfig::default());
        init_from_config(&LoggingConfig::default());
        assert!(LoggingBuilder::new().try_init().is_err());
    }
}
