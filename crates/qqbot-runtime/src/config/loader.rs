//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic base configuration ([`ConfigLoader::merge`])
//! 3. Config file (`qqbot.yaml` / `qqbot.yml` / `qqbot.toml`)
//! 4. Environment variables (`QQBOT_*`)
//!
//! # Feature Flags
//!
//! - `yaml-config` *(default)*: enables YAML configuration files
//! - `toml-config`: enables TOML configuration files
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `QQBOT_` prefix with `__` as separator:
//!
//! - `QQBOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `QQBOT_CLIENT__API_TIMEOUT_SECS=10` → `client.api_timeout_secs = 10`
//! - `QQBOT_UPDATES__SKIP_META_EVENTS=true` → `updates.skip_meta_events = true`
//!
//! # Example
//!
//! ```rust,ignore
//! use qqbot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./config/qqbot.yaml")
//!     .with_env()
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::QqBotConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "QQBOT_";

/// File names searched for, in order, in each search path.
const CONFIG_FILE_NAMES: &[&str] = &["qqbot.yaml", "qqbot.yml", "qqbot.toml"];

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic base, merged over the built-in defaults.
    base: Figment,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the current directory and reads the
    /// environment.
    pub fn new() -> Self {
        Self {
            base: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load. Its absence is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically. Files and environment
    /// variables still take precedence.
    pub fn merge(mut self, config: QqBotConfig) -> Self {
        self.base = self.base.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<QqBotConfig> {
        let figment = self.build_figment()?;
        let config: QqBotConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            logging_level = %config.logging.level,
            api_timeout_secs = config.client.api_timeout_secs,
            buffer_size = config.updates.buffer_size,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(QqBotConfig::default()))
            .merge(std::mem::take(&mut self.base));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, &path)?;
        } else if let Some(path) = self.find_config_file() {
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, &path)?;
        } else {
            debug!("No configuration file found, using defaults");
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Returns the first config file found across the search paths, skipping
    /// formats whose feature is disabled.
    fn find_config_file(&self) -> Option<PathBuf> {
        let cwd;
        let search_paths = if self.search_paths.is_empty() {
            cwd = std::env::current_dir().ok().into_iter().collect::<Vec<_>>();
            &cwd
        } else {
            &self.search_paths
        };

        search_paths
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .filter(|path| format_enabled(path))
            .find(|path| path.is_file())
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

fn format_enabled(path: &Path) -> bool {
    match extension(path) {
        "yaml" | "yml" => cfg!(feature = "yaml-config"),
        "toml" => cfg!(feature = "toml-config"),
        _ => false,
    }
}

/// Merges a single config file into the figment, dispatching on extension.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match extension(path) {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        ext => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<QqBotConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<QqBotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
