//! The typed message derived from a message update.

use serde::{Deserialize, Serialize};

use super::content::Content;
use super::entity::{Chat, User};

/// `Message::sub_type` for a normal group message.
pub const MESSAGE_NORMAL: &str = "normal";
/// `Message::sub_type` for an anonymous group message.
pub const MESSAGE_ANONYMOUS: &str = "anonymous";
/// `Message::sub_type` for a system notice posted into a group.
pub const MESSAGE_NOTICE: &str = "notice";

/// A received message.
///
/// Holds the parsed content alongside flat metadata about who sent it and
/// where.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// The formatted body.
    #[serde(rename = "message")]
    pub content: Content,
    pub message_id: i64,
    pub from: User,
    pub chat: Chat,
    /// `content` flattened to plain text.
    pub text: String,
    /// Only meaningful for group chats: `"normal"`, `"anonymous"` or
    /// `"notice"`.
    pub sub_type: String,
    pub font: i32,
}

impl Message {
    /// Returns true if the sender posted anonymously.
    pub fn is_anonymous(&self) -> bool {
        self.sub_type == MESSAGE_ANONYMOUS
    }

    /// Returns true if this is a system notice.
    pub fn is_notice(&self) -> bool {
        self.sub_type == MESSAGE_NOTICE
    }
}
