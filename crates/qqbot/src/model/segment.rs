//! Content segments.
//!
//! A segment is one unit of a message body. On the wire a segment is an
//! adjacently tagged object:
//!
//! ```text
//! {"type": "at", "data": {"qq": "10001000"}}
//! ```
//!
//! and in the legacy string form it is a CQ code:
//!
//! ```text
//! [CQ:at,qq=10001000]
//! ```
//!
//! Segment types outside the modeled set decode to [`Segment::Unknown`] and
//! encode back unchanged in either form.

use std::borrow::Cow;
use std::fmt::Write;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use qqbot_core::ContentSegment;

/// A single content segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Text(TextData),
    /// QQ face.
    Face(IdData),
    /// Unicode emoji, by code point.
    Emoji(IdData),
    /// Image.
    Image(MediaData),
    /// Voice recording.
    Record(MediaData),
    /// Mention of a user, or of everyone when `qq` is `"all"`.
    At(AtData),
    /// Rock-paper-scissors.
    Rps(EmptyData),
    /// Dice.
    Dice(EmptyData),
    /// Window shake.
    Shake(EmptyData),
    /// Send anonymously (outgoing group messages only).
    Anonymous(AnonymousData),
    /// Link share.
    Share(ShareData),
    /// Location.
    Location(LocationData),
    /// Music share.
    Music(MusicData),
    /// Reply to an earlier message.
    Reply(IdData),
    /// A segment type this crate does not model.
    #[serde(untagged)]
    Unknown(UnknownData),
}

/// Type tags of the modeled segments.
pub const SEGMENT_TYPES: &[&str] = &[
    "text", "face", "emoji", "image", "record", "at", "rps", "dice", "shake", "anonymous",
    "share", "location", "music", "reply",
];

impl ContentSegment for Segment {
    fn segment_type(&self) -> &str {
        match self {
            Segment::Text(_) => "text",
            Segment::Face(_) => "face",
            Segment::Emoji(_) => "emoji",
            Segment::Image(_) => "image",
            Segment::Record(_) => "record",
            Segment::At(_) => "at",
            Segment::Rps(_) => "rps",
            Segment::Dice(_) => "dice",
            Segment::Shake(_) => "shake",
            Segment::Anonymous(_) => "anonymous",
            Segment::Share(_) => "share",
            Segment::Location(_) => "location",
            Segment::Music(_) => "music",
            Segment::Reply(_) => "reply",
            Segment::Unknown(data) => data.segment_type.as_str(),
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(data) => Some(&data.text),
            _ => None,
        }
    }

    fn display(&self) -> String {
        match self {
            Segment::Text(data) => data.text.clone(),
            Segment::At(data) if data.is_all() => "@all".to_string(),
            Segment::At(data) => format!("@{}", data.qq),
            Segment::Share(data) => format!("[share:{}]", data.title),
            other => format!("[{}]", other.segment_type()),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl Segment {
    /// Creates a plain text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    /// Creates a QQ face segment.
    pub fn face(id: i32) -> Self {
        Segment::Face(IdData { id: id.to_string() })
    }

    /// Creates an emoji segment from a Unicode code point.
    pub fn emoji(code_point: u32) -> Self {
        Segment::Emoji(IdData {
            id: code_point.to_string(),
        })
    }

    /// Creates an image segment from a file name, path or URL.
    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(MediaData::new(file))
    }

    /// Creates a voice segment from a file name, path or URL.
    pub fn record(file: impl Into<String>) -> Self {
        Segment::Record(MediaData::new(file))
    }

    /// Creates a mention of a single user.
    pub fn at(qq: i64) -> Self {
        Segment::At(AtData { qq: qq.to_string() })
    }

    /// Creates a mention of every group member.
    pub fn at_all() -> Self {
        Segment::At(AtData {
            qq: "all".to_string(),
        })
    }

    /// Creates a rock-paper-scissors segment.
    pub fn rps() -> Self {
        Segment::Rps(EmptyData {})
    }

    /// Creates a dice segment.
    pub fn dice() -> Self {
        Segment::Dice(EmptyData {})
    }

    /// Creates a window shake segment.
    pub fn shake() -> Self {
        Segment::Shake(EmptyData {})
    }

    /// Creates a reply segment.
    pub fn reply(message_id: i64) -> Self {
        Segment::Reply(IdData {
            id: message_id.to_string(),
        })
    }

    /// Creates a link share segment.
    pub fn share(url: impl Into<String>, title: impl Into<String>) -> Self {
        Segment::Share(ShareData {
            url: url.into(),
            title: title.into(),
            content: None,
            image: None,
        })
    }
}

// ============================================================================
// Segment Data
// ============================================================================

/// Plain text data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

/// Data carrying a single identifier (face, emoji, reply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// Data for segments without parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmptyData {}

/// Image or voice data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaData {
    /// File name, local path or URL.
    pub file: String,
    /// Download URL (incoming only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MediaData {
    fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            url: None,
        }
    }
}

/// Mention data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtData {
    /// QQ number, or `"all"`.
    #[serde(deserialize_with = "string_or_number")]
    pub qq: String,
}

impl AtData {
    /// Returns true for a mention of everyone.
    pub fn is_all(&self) -> bool {
        self.qq == "all"
    }
}

/// Anonymous-send data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnonymousData {
    /// `"1"` to fall back to a normal send when anonymity is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
}

/// Link share data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareData {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Location data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub lat: String,
    pub lon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Music share data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicData {
    /// `"qq"`, `"163"`, `"xiami"` or `"custom"`.
    #[serde(rename = "type")]
    pub music_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A segment kept as received: its type tag and raw data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownData {
    #[serde(rename = "type")]
    pub segment_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Accepts `"123"` as well as `123` for identifier fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

// ============================================================================
// CQ Code Encoding
// ============================================================================

impl Segment {
    /// Encodes this segment as a CQ code.
    ///
    /// Text is returned escaped and without brackets.
    pub fn to_cq_code(&self) -> String {
        let mut params: Vec<(&str, &str)> = Vec::new();
        match self {
            Segment::Text(data) => return escape_cq_text(&data.text),
            Segment::Unknown(data) => {
                let values: Vec<(&str, Cow<'_, str>)> = data
                    .data
                    .iter()
                    .map(|(key, value)| {
                        let value = match value {
                            Value::String(s) => Cow::Borrowed(s.as_str()),
                            other => Cow::Owned(other.to_string()),
                        };
                        (key.as_str(), value)
                    })
                    .collect();
                let params: Vec<(&str, &str)> =
                    values.iter().map(|(key, value)| (*key, value.as_ref())).collect();
                return encode_cq(&data.segment_type, &params);
            }
            Segment::Face(data) | Segment::Emoji(data) | Segment::Reply(data) => {
                params.push(("id", data.id.as_str()));
            }
            Segment::Image(data) | Segment::Record(data) => {
                params.push(("file", data.file.as_str()));
            }
            Segment::At(data) => params.push(("qq", data.qq.as_str())),
            Segment::Rps(_) | Segment::Dice(_) | Segment::Shake(_) => {}
            Segment::Anonymous(data) => {
                if let Some(ignore) = &data.ignore {
                    params.push(("ignore", ignore.as_str()));
                }
            }
            Segment::Share(data) => {
                params.push(("url", data.url.as_str()));
                params.push(("title", data.title.as_str()));
                if let Some(content) = &data.content {
                    params.push(("content", content.as_str()));
                }
                if let Some(image) = &data.image {
                    params.push(("image", image.as_str()));
                }
            }
            Segment::Location(data) => {
                params.push(("lat", data.lat.as_str()));
                params.push(("lon", data.lon.as_str()));
                if let Some(title) = &data.title {
                    params.push(("title", title.as_str()));
                }
                if let Some(content) = &data.content {
                    params.push(("content", content.as_str()));
                }
            }
            Segment::Music(data) => {
                params.push(("type", data.music_type.as_str()));
                if let Some(id) = &data.id {
                    params.push(("id", id.as_str()));
                }
            }
        }

        encode_cq(self.segment_type(), &params)
    }

    /// Builds a segment from a parsed CQ code.
    ///
    /// Functions outside the modeled set become [`Segment::Unknown`]. Returns
    /// `None` when a modeled function lacks a required parameter.
    pub(crate) fn from_cq_parts(func: &str, params: &[(String, String)]) -> Option<Self> {
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let segment = match func {
            "face" => Segment::Face(IdData { id: get("id")? }),
            "emoji" => Segment::Emoji(IdData { id: get("id")? }),
            "reply" => Segment::Reply(IdData { id: get("id")? }),
            "image" => Segment::Image(MediaData {
                file: get("file")?,
                url: get("url"),
            }),
            "record" => Segment::Record(MediaData {
                file: get("file")?,
                url: get("url"),
            }),
            "at" => Segment::At(AtData { qq: get("qq")? }),
            "rps" => Segment::Rps(EmptyData {}),
            "dice" => Segment::Dice(EmptyData {}),
            "shake" => Segment::Shake(EmptyData {}),
            "anonymous" => Segment::Anonymous(AnonymousData {
                ignore: get("ignore"),
            }),
            "share" => Segment::Share(ShareData {
                url: get("url")?,
                title: get("title")?,
                content: get("content"),
                image: get("image"),
            }),
            "location" => Segment::Location(LocationData {
                lat: get("lat")?,
                lon: get("lon")?,
                title: get("title"),
                content: get("content"),
            }),
            "music" => Segment::Music(MusicData {
                music_type: get("type")?,
                id: get("id"),
            }),
            _ if func.is_empty() || SEGMENT_TYPES.contains(&func) => return None,
            _ => Segment::Unknown(UnknownData {
                segment_type: func.to_string(),
                data: params
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            }),
        };
        Some(segment)
    }
}

fn encode_cq(func: &str, params: &[(&str, &str)]) -> String {
    let mut cq = format!("[CQ:{func}");
    for (key, value) in params {
        // Writing into a String cannot fail.
        let _ = write!(cq, ",{key}={}", escape_cq_value(value));
    }
    cq.push(']');
    cq
}

// ============================================================================
// CQ Escaping
// ============================================================================

/// Escapes plain text for the CQ string form: `&`, `[` and `]`.
pub fn escape_cq_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
}

/// Escapes a CQ parameter value: `&`, `[`, `]` and `,`.
pub fn escape_cq_value(value: &str) -> String {
    escape_cq_text(value).replace(',', "&#44;")
}

/// Reverses [`escape_cq_text`] and [`escape_cq_value`].
///
/// `&amp;` is replaced last so that `&amp;#91;` decodes to the literal `&#91;`.
pub fn unescape_cq(text: &str) -> String {
    text.replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&#44;", ",")
        .replace("&amp;", "&")
}
