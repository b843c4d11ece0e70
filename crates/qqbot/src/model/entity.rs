//! Users, groups, chats and files.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// `Chat::chat_type` for one-to-one conversations.
pub const CHAT_PRIVATE: &str = "private";
/// `Chat::chat_type` for groups.
pub const CHAT_GROUP: &str = "group";
/// `Chat::chat_type` for discussion groups.
pub const CHAT_DISCUSS: &str = "discuss";

/// A QQ user.
///
/// Which fields are populated depends on where the value came from: a
/// message sender carries profile and group-member fields, an anonymous
/// group sender additionally carries the `anonymous_*` fields, and a user
/// built from a bare id carries only `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(rename = "user_id", deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub nickname: String,
    /// `"male"`, `"female"` or `"unknown"`.
    #[serde(deserialize_with = "null_as_default")]
    pub sex: String,
    #[serde(deserialize_with = "null_as_default")]
    pub age: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub area: String,

    // Group member
    #[serde(deserialize_with = "null_as_default")]
    pub card: String,
    #[serde(deserialize_with = "null_as_default")]
    pub card_changeable: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "title_expire_time", deserialize_with = "null_as_default")]
    pub title_expire_time_unix: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub level: String,
    /// `"owner"`, `"admin"` or `"member"`.
    #[serde(deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(deserialize_with = "null_as_default")]
    pub unfriendly: bool,
    #[serde(rename = "join_time", deserialize_with = "null_as_default")]
    pub join_time_unix: i64,
    #[serde(rename = "last_sent_time", deserialize_with = "null_as_default")]
    pub last_sent_time_unix: i64,

    // Anonymous sender
    #[serde(deserialize_with = "null_as_default")]
    pub anonymous_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub anonymous_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub anonymous_flag: String,
}

impl User {
    /// Creates a user that carries only an id.
    pub fn from_id(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Returns the name to show for this user.
    ///
    /// The first non-empty of anonymous name, group card and nickname; the
    /// decimal id when all three are empty.
    pub fn name(&self) -> Cow<'_, str> {
        [&self.anonymous_name, &self.card, &self.nickname]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or_else(|| Cow::Owned(self.id.to_string()), |s| Cow::Borrowed(s.as_str()))
    }

    /// Returns true if this sender posted anonymously.
    pub fn is_anonymous(&self) -> bool {
        !self.anonymous_name.is_empty() || self.anonymous_id != 0
    }
}

/// Formats as `[title]name`, or just `name` without a title.
impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.title.is_empty() {
            write!(f, "[{}]", self.title)?;
        }
        f.write_str(&self.name())
    }
}

/// Decodes a scalar field, reading JSON `null` as the zero value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A QQ group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "group_id")]
    pub id: i64,
    #[serde(rename = "group_name", default)]
    pub name: String,
}

/// The place a message was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chat {
    /// User id, group id or discuss id depending on `chat_type`.
    pub id: i64,
    /// `"private"`, `"group"` or `"discuss"`.
    #[serde(rename = "type")]
    pub chat_type: String,
    /// Only meaningful for private chats: `"friend"`, `"group"`, `"discuss"`
    /// or `"other"`.
    pub sub_type: String,
}

impl Chat {
    /// Returns true for a one-to-one conversation.
    pub fn is_private(&self) -> bool {
        self.chat_type == CHAT_PRIVATE
    }

    /// Returns true for a group.
    pub fn is_group(&self) -> bool {
        self.chat_type == CHAT_GROUP
    }

    /// Returns true for a discussion group.
    pub fn is_discuss(&self) -> bool {
        self.chat_type == CHAT_DISCUSS
    }
}

/// Metadata of an uploaded file. The bytes are fetched separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Size in bytes.
    #[serde(deserialize_with = "null_as_default")]
    pub size: i64,
    /// Handle the remote API uses to locate the file contents.
    #[serde(deserialize_with = "null_as_default")]
    pub busid: i64,
}
