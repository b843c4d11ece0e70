//! API call envelopes.
//!
//! A call is a [`Request`] `{action, params, echo}`; the remote end answers
//! with a [`Response`] `{status, retcode, data, echo}`. The `echo` token is
//! opaque and kept as a JSON value so its type survives the round trip: an
//! integer echo comes back as an integer, never as its string form.
//!
//! `data` is left undecoded. Only the caller knows, from the action it sent,
//! what shape to expect, and decodes it with [`Response::decode`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use qqbot_core::DecodeResult;

use super::content::Content;

pub const STATUS_OK: &str = "ok";
pub const STATUS_ASYNC: &str = "async";
pub const STATUS_FAILED: &str = "failed";

/// An outgoing API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub echo: Value,
}

impl Request {
    /// Creates a call with no parameters and no echo.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
            echo: Value::Null,
        }
    }

    /// Sets a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the correlation token.
    pub fn with_echo(mut self, echo: impl Into<Value>) -> Self {
        self.echo = echo.into();
        self
    }

    /// Returns true if a correlation token has been set.
    pub fn has_echo(&self) -> bool {
        !self.echo.is_null()
    }

    /// Serializes to JSON bytes.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    // --------------------------------
    // Common actions
    // --------------------------------

    pub fn send_private_msg(user_id: i64, message: impl Into<Content>) -> Self {
        Self::new("send_private_msg")
            .param("user_id", user_id)
            .param("message", content_value(message.into()))
    }

    pub fn send_group_msg(group_id: i64, message: impl Into<Content>) -> Self {
        Self::new("send_group_msg")
            .param("group_id", group_id)
            .param("message", content_value(message.into()))
    }

    pub fn send_discuss_msg(discuss_id: i64, message: impl Into<Content>) -> Self {
        Self::new("send_discuss_msg")
            .param("discuss_id", discuss_id)
            .param("message", content_value(message.into()))
    }

    pub fn delete_msg(message_id: i64) -> Self {
        Self::new("delete_msg").param("message_id", message_id)
    }

    /// Answers with a [`User`](super::entity::User) carrying the bot's id and
    /// nickname.
    pub fn get_login_info() -> Self {
        Self::new("get_login_info")
    }

    pub fn get_stranger_info(user_id: i64, no_cache: bool) -> Self {
        Self::new("get_stranger_info")
            .param("user_id", user_id)
            .param("no_cache", no_cache)
    }

    /// Answers with a list of [`Group`](super::entity::Group).
    pub fn get_group_list() -> Self {
        Self::new("get_group_list")
    }

    pub fn get_group_member_info(group_id: i64, user_id: i64, no_cache: bool) -> Self {
        Self::new("get_group_member_info")
            .param("group_id", group_id)
            .param("user_id", user_id)
            .param("no_cache", no_cache)
    }

    pub fn get_group_member_list(group_id: i64) -> Self {
        Self::new("get_group_member_list").param("group_id", group_id)
    }

    /// Approves or rejects a friend request. `flag` comes from the request
    /// update.
    pub fn set_friend_add_request(flag: impl Into<String>, approve: bool, remark: &str) -> Self {
        let request = Self::new("set_friend_add_request")
            .param("flag", flag.into())
            .param("approve", approve);
        if remark.is_empty() {
            request
        } else {
            request.param("remark", remark)
        }
    }

    /// Approves or rejects a group join request or invitation. `sub_type` is
    /// `"add"` or `"invite"`; `reason` is only sent on rejection.
    pub fn set_group_add_request(
        flag: impl Into<String>,
        sub_type: impl Into<String>,
        approve: bool,
        reason: &str,
    ) -> Self {
        let request = Self::new("set_group_add_request")
            .param("flag", flag.into())
            .param("type", sub_type.into())
            .param("approve", approve);
        if approve || reason.is_empty() {
            request
        } else {
            request.param("reason", reason)
        }
    }
}

fn content_value(content: Content) -> Value {
    // A segment list always serializes.
    serde_json::to_value(content).unwrap_or(Value::Null)
}

/// The remote end's answer to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// `"ok"`, `"async"` or `"failed"`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub retcode: i64,
    /// The undecoded payload; `None` when absent or `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub echo: Value,
}

impl Response {
    /// Decodes a response from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> DecodeResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns true when the call succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK && self.retcode == 0
    }

    /// Returns true when the remote end accepted the call for asynchronous
    /// execution.
    pub fn is_async(&self) -> bool {
        self.status == STATUS_ASYNC
    }

    /// Returns the raw `data` JSON text, `"null"` when absent.
    pub fn raw_data(&self) -> &str {
        self.data.as_deref().map_or("null", RawValue::get)
    }

    /// Decodes `data` into the type the caller expects for its action.
    pub fn decode<T: DeserializeOwned>(&self) -> DecodeResult<T> {
        Ok(serde_json::from_str(self.raw_data())?)
    }
}
