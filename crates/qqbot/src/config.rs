//! Configuration for the API client and the update channel.
//!
//! Both structs deserialize with per-field defaults, so a partial section is
//! enough:
//!
//! ```yaml
//! client:
//!   api_timeout_secs: 10
//!   echo_prefix: "bot-"
//! updates:
//!   skip_meta_events: true
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// [`Client`](crate::Client) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long to wait for the echoed response to a call.
    pub api_timeout_secs: u64,

    /// When set, generated echo tokens are strings `"{prefix}{n}"` instead of
    /// integers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo_prefix: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: default_api_timeout(),
            echo_prefix: None,
        }
    }
}

impl ClientConfig {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

fn default_api_timeout() -> u64 {
    30
}

/// Update channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatesConfig {
    /// Capacity of the delivery channel.
    pub buffer_size: usize,

    /// Drop heartbeat and lifecycle updates instead of delivering them.
    pub skip_meta_events: bool,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            skip_meta_events: false,
        }
    }
}

fn default_buffer_size() -> usize {
    100
}
