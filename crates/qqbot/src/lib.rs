//! # qqbot
//!
//! A typed client library for the QQ bot HTTP/WebSocket API.
//!
//! ## Overview
//!
//! - [`model`]: wire envelopes ([`Request`], [`Response`]), entities
//!   ([`User`], [`Group`], [`Chat`], [`File`]), formatted [`Content`] and the
//!   update normalizer that turns a flat wire event into an [`Update`] with a
//!   typed [`Message`].
//! - [`Client`]: issues API calls through a [`Transport`] and matches the
//!   responses by echo token.
//! - [`updates_channel`]: splits inbound frames into API responses and
//!   updates, and delivers updates in order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use qqbot::{ChannelTransport, Client, ClientConfig, Request, UpdatesConfig, updates_channel};
//!
//! let (transport, outbound) = ChannelTransport::pair(64);
//! let client = Arc::new(Client::new(Arc::new(transport), &ClientConfig::default()));
//! let (sender, mut updates) = updates_channel(&UpdatesConfig::default());
//! let sender = sender.with_client(client.clone());
//!
//! // Socket reader task: sender.push_frame(&frame).await
//! // Socket writer task: drains `outbound`
//!
//! while let Some(update) = updates.recv().await {
//!     if let Some(message) = update.message() {
//!         if message.chat.is_group() && message.text == "ping" {
//!             client.call(Request::send_group_msg(message.chat.id, "pong")).await?;
//!         }
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod model;
pub mod updates;

pub use client::{ChannelTransport, Client, Transport};
pub use config::{ClientConfig, UpdatesConfig};
pub use model::{
    Chat, Content, File, Group, Message, MetaEvent, NoticeEvent, NoticeKind, RawUpdate, Request,
    RequestEvent, Response, Segment, Update, UpdateKind, User,
};
pub use updates::{FrameOutcome, UpdateSender, UpdatesChannel, updates_channel};

pub use qqbot_core::{
    ApiError, ApiResult, ContentSegment, DecodeError, DecodeResult, FormattedContent,
    TransportError, TransportResult,
};
