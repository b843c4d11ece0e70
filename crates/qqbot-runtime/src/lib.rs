//! qqbot runtime - configuration, logging and wiring for qqbot processes.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, figment based)
//! - Logging initialization (`LoggingBuilder`, `init_from_config`)
//! - `BotRuntime`, which builds a [`qqbot::Client`] and update channel from
//!   a [`QqBotConfig`] and a [`qqbot::Transport`]
//!
//! ```ignore
//! use std::sync::Arc;
//! use qqbot::{ChannelTransport, Request};
//! use qqbot_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (transport, outbound) = ChannelTransport::pair(64);
//!     let mut runtime = BotRuntime::load(Arc::new(transport))?;
//!     let mut updates = runtime.take_updates().unwrap_or_else(|| unreachable!());
//!     let client = runtime.client();
//!
//!     // Spawn the socket tasks here: frames read go to `runtime.feed`,
//!     // frames in `outbound` get written.
//!
//!     while let Some(update) = updates.recv().await {
//!         if let Some(message) = update.message() {
//!             if message.chat.is_private() {
//!                 client
//!                     .call(Request::send_private_msg(message.chat.id, message.text.as_str()))
//!                     .await?;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, QqBotConfig};
pub use logging::LoggingBuilder;
pub use runtime::BotRuntime;
