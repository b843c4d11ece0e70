//! Inbound updates and their normalization.
//!
//! The remote end posts every event as one flat JSON object. Which fields are
//! meaningful depends on the discriminators:
//!
//! ```text
//! post_type = "message"     message_type ∈ {private, group, discuss}
//! post_type = "notice"      notice_type  ∈ {group_upload, group_admin, ...}
//! post_type = "request"     request_type ∈ {friend, group}
//! post_type = "meta_event"  meta_event_type ∈ {lifecycle, heartbeat}
//! ```
//!
//! [`RawUpdate`] is that flat record, decoded as-is. [`Update`] wraps it
//! together with a typed view ([`UpdateKind`]) and the derived plain text.
//! Normalization never fails: unknown discriminators simply produce an
//! unclassified variant, and a message body that matches neither wire shape
//! is treated as empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

use qqbot_core::{DecodeResult, FormattedContent};

use super::content::Content;
use super::entity::{CHAT_DISCUSS, CHAT_GROUP, CHAT_PRIVATE, Chat, File, User, null_as_default};
use super::message::Message;

pub const POST_MESSAGE: &str = "message";
pub const POST_NOTICE: &str = "notice";
pub const POST_REQUEST: &str = "request";
pub const POST_META_EVENT: &str = "meta_event";
/// Pre-v4 name for notices; the notice type is then carried in `event`.
pub const POST_LEGACY_EVENT: &str = "event";

// ============================================================================
// RawUpdate - the wire record
// ============================================================================

/// An update exactly as it appears on the wire.
///
/// A superset of every event shape; fields that do not apply to the current
/// `post_type` are left zero-valued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawUpdate {
    #[serde(deserialize_with = "null_as_default")]
    pub time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub self_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub post_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sub_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub group_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub discuss_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub font: i32,
    /// Message body, either a segment array or CQ-coded text.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub message: Value,
    /// CQ-coded form of the body, sent by some implementations beside
    /// `message`.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub raw_message: String,
    /// `{id, name, flag}` object, or a bare name on older implementations.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub anonymous: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub anonymous_flag: String,
    #[serde(deserialize_with = "null_as_default")]
    pub event: String,
    #[serde(deserialize_with = "null_as_default")]
    pub notice_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub operator_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<File>,
    #[serde(deserialize_with = "null_as_default")]
    pub request_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(deserialize_with = "null_as_default")]
    pub flag: String,
    #[serde(deserialize_with = "null_as_default")]
    pub meta_event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
}

// ============================================================================
// Typed view
// ============================================================================

/// The typed form of an update, keyed by `post_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    Notice(NoticeEvent),
    Request(RequestEvent),
    MetaEvent(MetaEvent),
    /// A `post_type` this library does not know.
    Other { post_type: String },
}

/// A notice: something happened to a group or friend list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoticeEvent {
    pub notice_type: String,
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub operator_id: i64,
    /// Mute duration in seconds, for `group_ban`.
    pub duration: i64,
    /// The uploaded file, for `group_upload`.
    pub file: Option<File>,
}

/// Known notice types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    GroupUpload,
    GroupAdmin,
    GroupDecrease,
    GroupIncrease,
    GroupBan,
    FriendAdd,
    GroupRecall,
    FriendRecall,
    Unknown,
}

impl NoticeEvent {
    pub fn kind(&self) -> NoticeKind {
        match self.notice_type.as_str() {
            "group_upload" => NoticeKind::GroupUpload,
            "group_admin" => NoticeKind::GroupAdmin,
            "group_decrease" => NoticeKind::GroupDecrease,
            "group_increase" => NoticeKind::GroupIncrease,
            "group_ban" => NoticeKind::GroupBan,
            "friend_add" => NoticeKind::FriendAdd,
            "group_recall" => NoticeKind::GroupRecall,
            "friend_recall" => NoticeKind::FriendRecall,
            _ => NoticeKind::Unknown,
        }
    }
}

/// A friend or group request awaiting approval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEvent {
    pub request_type: String,
    /// For group requests: `"add"` or `"invite"`.
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub comment: String,
    /// Opaque token to pass back when approving or rejecting.
    pub flag: String,
}

impl RequestEvent {
    /// Returns true for a friend request.
    pub fn is_friend(&self) -> bool {
        self.request_type == "friend"
    }

    /// Returns true for a group join request or invitation.
    pub fn is_group(&self) -> bool {
        self.request_type == "group"
    }
}

/// A heartbeat or lifecycle event from the remote implementation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaEvent {
    pub meta_event_type: String,
    pub sub_type: String,
}

impl MetaEvent {
    pub fn is_heartbeat(&self) -> bool {
        self.meta_event_type == "heartbeat"
    }

    pub fn is_lifecycle(&self) -> bool {
        self.meta_event_type == "lifecycle"
    }
}

// ============================================================================
// Update
// ============================================================================

/// A decoded and normalized update.
///
/// Serializes back to its wire record; the derived text and typed view are
/// never written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUpdate", into = "RawUpdate")]
pub struct Update {
    raw: RawUpdate,
    /// The typed view.
    pub kind: UpdateKind,
    /// The `message` field flattened to plain text, empty when absent.
    pub text: String,
}

impl Update {
    /// Decodes and normalizes an update from JSON text.
    pub fn parse(json: &str) -> DecodeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decodes and normalizes an update from a JSON value.
    pub fn from_value(value: Value) -> DecodeResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the untouched wire record.
    pub fn raw(&self) -> &RawUpdate {
        &self.raw
    }

    pub fn time(&self) -> i64 {
        self.raw.time
    }

    pub fn self_id(&self) -> i64 {
        self.raw.self_id
    }

    pub fn post_type(&self) -> &str {
        &self.raw.post_type
    }

    /// Returns the message, present only for message updates.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&NoticeEvent> {
        match &self.kind {
            UpdateKind::Notice(notice) => Some(notice),
            _ => None,
        }
    }

    pub fn request(&self) -> Option<&RequestEvent> {
        match &self.kind {
            UpdateKind::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn meta_event(&self) -> Option<&MetaEvent> {
        match &self.kind {
            UpdateKind::MetaEvent(meta) => Some(meta),
            _ => None,
        }
    }

    /// Consumes the update, returning its message if it has one.
    pub fn into_message(self) -> Option<Message> {
        match self.kind {
            UpdateKind::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        normalize(raw)
    }
}

impl From<Update> for RawUpdate {
    fn from(update: Update) -> Self {
        update.raw
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Derives the typed view and plain text from a wire record.
pub fn normalize(raw: RawUpdate) -> Update {
    let content = decode_content(&raw);
    let text = content
        .as_ref()
        .map(|content| content.plain_text())
        .unwrap_or_default();

    let kind = match raw.post_type.as_str() {
        POST_MESSAGE => UpdateKind::Message(Message {
            content: content.unwrap_or_default(),
            message_id: raw.message_id,
            from: build_sender(&raw),
            chat: build_chat(&raw),
            text: text.clone(),
            sub_type: if raw.message_type == CHAT_PRIVATE {
                String::new()
            } else {
                raw.sub_type.clone()
            },
            font: raw.font,
        }),
        POST_NOTICE => UpdateKind::Notice(build_notice(&raw, &raw.notice_type)),
        POST_LEGACY_EVENT => UpdateKind::Notice(build_notice(&raw, &raw.event)),
        POST_REQUEST => UpdateKind::Request(RequestEvent {
            request_type: raw.request_type.clone(),
            sub_type: raw.sub_type.clone(),
            group_id: raw.group_id,
            user_id: raw.user_id,
            comment: raw.comment.clone(),
            flag: raw.flag.clone(),
        }),
        POST_META_EVENT => UpdateKind::MetaEvent(MetaEvent {
            meta_event_type: raw.meta_event_type.clone(),
            sub_type: raw.sub_type.clone(),
        }),
        other => {
            trace!(post_type = %other, "Unclassified update");
            UpdateKind::Other {
                post_type: other.to_string(),
            }
        }
    };

    Update { raw, kind, text }
}

/// Decodes the message body, trying both wire shapes.
///
/// Falls back to `raw_message` when `message` is absent.
fn decode_content(raw: &RawUpdate) -> Option<Content> {
    if raw.message.is_null() {
        return (!raw.raw_message.is_empty()).then(|| Content::from_cq_string(&raw.raw_message));
    }

    let content = Content::decode_lenient(&raw.message);
    if content.is_none() {
        warn!(
            post_type = %raw.post_type,
            message_id = raw.message_id,
            "Message body matches neither segment array nor CQ string, treating as empty"
        );
    }
    content
}

/// Builds the chat from `message_type` and the matching id.
fn build_chat(raw: &RawUpdate) -> Chat {
    let id = match raw.message_type.as_str() {
        CHAT_PRIVATE => raw.user_id,
        CHAT_GROUP => raw.group_id,
        CHAT_DISCUSS => raw.discuss_id,
        _ => [raw.group_id, raw.discuss_id, raw.user_id]
            .into_iter()
            .find(|&id| id != 0)
            .unwrap_or_default(),
    };

    Chat {
        id,
        chat_type: raw.message_type.clone(),
        sub_type: if raw.message_type == CHAT_PRIVATE {
            raw.sub_type.clone()
        } else {
            String::new()
        },
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct Anonymous {
    id: i64,
    name: String,
    flag: String,
}

/// Builds the sender, falling back to a bare user when `sender` is absent.
fn build_sender(raw: &RawUpdate) -> User {
    let mut user = raw
        .sender
        .clone()
        .unwrap_or_else(|| User::from_id(raw.user_id));
    if user.id == 0 {
        user.id = raw.user_id;
    }

    match &raw.anonymous {
        Value::Object(_) => match Anonymous::deserialize(&raw.anonymous) {
            Ok(anonymous) => {
                user.anonymous_id = anonymous.id;
                user.anonymous_name = anonymous.name;
                user.anonymous_flag = anonymous.flag;
            }
            Err(e) => warn!(error = %e, "Ignoring malformed anonymous sender info"),
        },
        Value::String(name) => user.anonymous_name.clone_from(name),
        _ => {}
    }
    if user.anonymous_flag.is_empty() {
        user.anonymous_flag.clone_from(&raw.anonymous_flag);
    }

    user
}

fn build_notice(raw: &RawUpdate, notice_type: &str) -> NoticeEvent {
    NoticeEvent {
        notice_type: notice_type.to_string(),
        sub_type: raw.sub_type.clone(),
        group_id: raw.group_id,
        user_id: raw.user_id,
        operator_id: raw.operator_id,
        duration: raw.duration,
        file: raw.file.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::message::MESSAGE_NORMAL;

    #[test]
    fn test_group_message() {
        let update = Update::from_value(json!({
            "time": 1515204254,
            "post_type": "message",
            "message_type": "group",
            "sub_type": "normal",
            "message_id": 10,
            "group_id": 1001,
            "user_id": 7,
            "message": "hello",
            "font": 456,
            "sender": {"user_id": 7, "nickname": "Bob"}
        }))
        .unwrap();

        let message = update.message().unwrap();
        assert_eq!(message.chat.id, 1001);
        assert_eq!(message.chat.chat_type, "group");
        assert!(message.chat.is_group());
        assert_eq!(message.chat.sub_type, "");
        assert_eq!(message.from.name(), "Bob");
        assert_eq!(message.text, "hello");
        assert_eq!(message.sub_type, MESSAGE_NORMAL);
        assert_eq!(message.font, 456);
        assert_eq!(update.text, "hello");
        assert_eq!(update.time(), 1515204254);
    }

    #[test]
    fn test_null_fields_read_as_zero() {
        let update = Update::parse(
            r#"{
                "post_type": "message",
                "message_type": "group",
                "sub_type": null,
                "group_id": 1001,
                "user_id": 7,
                "font": null,
                "raw_message": null,
                "message": "hi",
                "sender": {"user_id": 7, "nickname": null, "card": "C", "age": null}
            }"#,
        )
        .unwrap();

        let message = update.message().unwrap();
        assert_eq!(message.sub_type, "");
        assert_eq!(message.font, 0);
        assert_eq!(message.from.name(), "C");
        assert_eq!(message.from.age, 0);
        assert_eq!(update.text, "hi");
        assert!(!message.is_anonymous() && !message.is_notice());
    }

    #[test]
    fn test_private_message_chat_sub_type() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "user_id": 12345,
            "message": [{"type": "text", "data": {"text": "hi "}}, {"type": "face", "data": {"id": "14"}}]
        }))
        .unwrap();

        let message = update.message().unwrap();
        assert_eq!(message.chat.id, 12345);
        assert!(message.chat.is_private());
        assert_eq!(message.chat.sub_type, "friend");
        assert_eq!(message.sub_type, "");
        assert_eq!(message.content.len(), 2);
        assert_eq!(message.text, "hi ");
    }

    #[test]
    fn test_discuss_message() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "discuss",
            "discuss_id": 555,
            "user_id": 9,
            "message": "yo"
        }))
        .unwrap();
        let chat = &update.message().unwrap().chat;
        assert_eq!(chat.id, 555);
        assert!(chat.is_discuss());
    }

    #[test]
    fn test_sender_fallback_to_user_id() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": 42,
            "message": "x"
        }))
        .unwrap();
        let from = &update.message().unwrap().from;
        assert_eq!(from.id, 42);
        assert_eq!(from.name(), "42");
    }

    #[test]
    fn test_anonymous_sender_object() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "group",
            "sub_type": "anonymous",
            "group_id": 1,
            "user_id": 80000000,
            "anonymous": {"id": 123, "name": "Ghost", "flag": "f"},
            "message": "boo",
            "sender": {"user_id": 80000000, "nickname": "anon", "card": "c"}
        }))
        .unwrap();
        let message = update.message().unwrap();
        assert!(message.is_anonymous());
        assert_eq!(message.from.anonymous_id, 123);
        assert_eq!(message.from.anonymous_flag, "f");
        assert_eq!(message.from.name(), "Ghost");
    }

    #[test]
    fn test_anonymous_sender_legacy_string() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "group",
            "sub_type": "anonymous",
            "group_id": 1,
            "user_id": 80000000,
            "anonymous": "Ghost",
            "anonymous_flag": "legacy-flag",
            "message": "boo"
        }))
        .unwrap();
        let from = &update.message().unwrap().from;
        assert_eq!(from.anonymous_name, "Ghost");
        assert_eq!(from.anonymous_flag, "legacy-flag");
        assert!(from.is_anonymous());
    }

    #[test]
    fn test_notice_has_no_message() {
        let update = Update::from_value(json!({
            "post_type": "notice",
            "notice_type": "group_increase",
            "sub_type": "approve",
            "group_id": 1001,
            "operator_id": 1,
            "user_id": 2
        }))
        .unwrap();
        assert!(update.message().is_none());
        assert_eq!(update.text, "");
        let notice = update.notice().unwrap();
        assert_eq!(notice.kind(), NoticeKind::GroupIncrease);
        assert_eq!(notice.operator_id, 1);
    }

    #[test]
    fn test_group_upload_notice_file() {
        let update = Update::from_value(json!({
            "post_type": "notice",
            "notice_type": "group_upload",
            "group_id": 1,
            "user_id": 2,
            "file": {"id": "/x", "name": "a.zip", "size": 1024, "busid": 102}
        }))
        .unwrap();
        let notice = update.notice().unwrap();
        assert_eq!(notice.kind(), NoticeKind::GroupUpload);
        assert_eq!(notice.file.as_ref().unwrap().busid, 102);
    }

    #[test]
    fn test_legacy_event_post_type() {
        let update = Update::from_value(json!({
            "post_type": "event",
            "event": "group_admin",
            "sub_type": "set",
            "group_id": 1,
            "user_id": 2
        }))
        .unwrap();
        assert_eq!(update.notice().unwrap().kind(), NoticeKind::GroupAdmin);
        assert_eq!(update.post_type(), "event");
    }

    #[test]
    fn test_request_text_from_message_field() {
        let update = Update::from_value(json!({
            "post_type": "request",
            "request_type": "friend",
            "user_id": 3,
            "message": "please add me",
            "flag": "abc"
        }))
        .unwrap();
        assert!(update.message().is_none());
        assert_eq!(update.text, "please add me");
        let request = update.request().unwrap();
        assert!(request.is_friend());
        assert_eq!(request.flag, "abc");
    }

    #[test]
    fn test_unknown_discriminators_pass_through() {
        let update = Update::from_value(json!({"post_type": "mystery", "user_id": 1})).unwrap();
        assert_eq!(
            update.kind,
            UpdateKind::Other {
                post_type: "mystery".into()
            }
        );
        assert!(update.message().is_none());

        let update = Update::from_value(json!({
            "post_type": "notice",
            "notice_type": "something_new"
        }))
        .unwrap();
        assert_eq!(update.notice().unwrap().kind(), NoticeKind::Unknown);

        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "channel",
            "sub_type": "weird",
            "group_id": 77,
            "message": "m"
        }))
        .unwrap();
        let message = update.message().unwrap();
        assert_eq!(message.chat.id, 77);
        assert!(!message.chat.is_private() && !message.chat.is_group() && !message.chat.is_discuss());
        assert!(!message.is_anonymous() && !message.is_notice());
    }

    #[test]
    fn test_malformed_message_body_is_tolerated() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "group",
            "message_id": 3,
            "group_id": 1001,
            "user_id": 7,
            "message": {"unexpected": "shape"},
            "sender": {"user_id": 7, "nickname": "Bob"}
        }))
        .unwrap();
        assert_eq!(update.text, "");
        let message = update.message().unwrap();
        assert!(message.content.is_empty());
        assert_eq!(message.message_id, 3);
        assert_eq!(message.chat.id, 1001);
        assert_eq!(message.from.name(), "Bob");
    }

    #[test]
    fn test_raw_message_fallback() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": 1,
            "raw_message": "hi [CQ:at,qq=2]"
        }))
        .unwrap();
        let message = update.message().unwrap();
        assert_eq!(message.text, "hi ");
        assert_eq!(message.content.mentioned_users(), vec![2]);
    }

    #[test]
    fn test_meta_event() {
        let update = Update::parse(
            r#"{"time":1,"self_id":10,"post_type":"meta_event","meta_event_type":"heartbeat","interval":5000}"#,
        )
        .unwrap();
        assert!(update.meta_event().unwrap().is_heartbeat());
        assert_eq!(update.self_id(), 10);
    }

    #[test]
    fn test_serialize_omits_derived_fields() {
        let update = Update::from_value(json!({
            "post_type": "message",
            "message_type": "group",
            "group_id": 1001,
            "user_id": 7,
            "message": "hello"
        }))
        .unwrap();
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["message"], "hello");
        assert_eq!(value["group_id"], 1001);
        assert!(value.get("text").is_none());
        assert!(value.get("kind").is_none());
        assert_eq!(update.raw().message, json!("hello"));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        assert!(Update::parse("{not json").is_err());
        assert!(Update::parse(r#"{"post_type": 5}"#).is_err());
    }
}
