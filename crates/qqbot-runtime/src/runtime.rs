//! Wiring of configuration, logging, client and update channel.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use qqbot::ChannelTransport;
//! use qqbot_runtime::BotRuntime;
//!
//! let (transport, outbound) = ChannelTransport::pair(64);
//! let mut runtime = BotRuntime::from_config_file("qqbot.yaml", Arc::new(transport))?;
//! let mut updates = runtime.take_updates().unwrap_or_else(|| unreachable!());
//!
//! // Socket reader: runtime.feed(&frame).await
//! // Socket writer: drains `outbound`
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use qqbot::{Client, DecodeResult, FrameOutcome, Transport, UpdateSender, UpdatesChannel};

use crate::config::{ConfigLoader, ConfigResult, QqBotConfig, validate_config};
use crate::logging;

/// A configured client plus the update channel it feeds.
pub struct BotRuntime {
    config: QqBotConfig,
    client: Arc<Client>,
    sender: UpdateSender,
    updates: Option<UpdatesChannel>,
}

impl BotRuntime {
    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging from `config.logging` unless a subscriber is
    /// already installed.
    ///
    /// # Errors
    /// Fails when the configuration does not validate.
    pub fn new(config: QqBotConfig, transport: Arc<dyn Transport>) -> ConfigResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let client = Arc::new(Client::new(transport, &config.client));
        let (sender, updates) = qqbot::updates_channel(&config.updates);
        let sender = sender.with_client(client.clone());

        info!(
            api_timeout_secs = config.client.api_timeout_secs,
            buffer_size = config.updates.buffer_size,
            skip_meta_events = config.updates.skip_meta_events,
            "Bot runtime ready"
        );

        Ok(Self {
            config,
            client,
            sender,
            updates: Some(updates),
        })
    }

    /// Loads configuration from the default locations and creates a runtime.
    pub fn load(transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        let config = ConfigLoader::new().load()?;
        Ok(Self::new(config, transport)?)
    }

    /// Loads configuration from `path` (plus environment overrides) and
    /// creates a runtime.
    pub fn from_config_file<P: AsRef<Path>>(
        path: P,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        let config = ConfigLoader::new().file(path).load()?;
        Ok(Self::new(config, transport)?)
    }

    pub fn config(&self) -> &QqBotConfig {
        &self.config
    }

    /// Returns the API client.
    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    /// Returns a sender for frames read off the connection.
    pub fn sender(&self) -> UpdateSender {
        self.sender.clone()
    }

    /// Takes the consuming half of the update channel. `None` after the
    /// first call.
    pub fn take_updates(&mut self) -> Option<UpdatesChannel> {
        self.updates.take()
    }

    /// Processes one inbound frame.
    pub async fn feed(&self, frame: &[u8]) -> DecodeResult<FrameOutcome> {
        self.sender.push_frame(frame).await
    }

    /// Fails every outstanding API call. Call when the connection drops.
    pub fn disconnect(&self) {
        debug!(pending = self.client.pending_count(), "Connection lost");
        self.client.clear_pending();
    }
}
