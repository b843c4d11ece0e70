//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LoggingConfig, QqBotConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &QqBotConfig) -> ConfigResult<()> {
    if config.client.api_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "client.api_timeout_secs must be greater than 0",
        ));
    }

    if config.updates.buffer_size == 0 {
        return Err(ConfigError::validation(
            "updates.buffer_size must be greater than 0",
        ));
    }

    validate_logging_config(&config.logging)
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if let Some(module) = logging
        .filters
        .keys()
        .find(|m| m.is_empty() || m.contains(char::is_whitespace))
    {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter target: {module:?}"
        )));
    }
    Ok(())
}
