//! Configuration for a qqbot process.
//!
//! Loaded with figment from defaults, an optional YAML or TOML file and
//! `QQBOT_*` environment variables, then validated.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{LogFormat, LogLevel, LoggingConfig, QqBotConfig};
pub use validation::validate_config;

pub use qqbot::{ClientConfig, UpdatesConfig};
