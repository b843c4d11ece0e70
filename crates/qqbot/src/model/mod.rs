//! Data model for the QQ bot wire protocol.
//!
//! Entities and envelopes decode straight from the JSON the remote end sends.
//! [`Update`] additionally runs the normalizer that derives a typed
//! [`Message`] from a message event.

pub mod api;
pub mod content;
pub mod entity;
pub mod message;
pub mod segment;
pub mod update;

pub use api::{Request, Response};
pub use content::{Content, parse_cq_string};
pub use entity::{CHAT_DISCUSS, CHAT_GROUP, CHAT_PRIVATE, Chat, File, Group, User};
pub use message::{MESSAGE_ANONYMOUS, MESSAGE_NORMAL, MESSAGE_NOTICE, Message};
pub use segment::{
    AnonymousData, AtData, EmptyData, IdData, LocationData, MediaData, MusicData, Segment,
    ShareData, TextData, UnknownData,
};
pub use update::{
    MetaEvent, NoticeEvent, NoticeKind, RawUpdate, RequestEvent, Update, UpdateKind, normalize,
};
