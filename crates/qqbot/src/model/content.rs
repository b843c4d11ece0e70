//! Formatted message content.
//!
//! [`Content`] is the ordered segment list that makes up a message body. The
//! remote end may send it in either of two shapes:
//!
//! - **Array**: `[{"type":"text","data":{"text":"hi"}}, ...]`
//! - **String**: CQ-coded text, `hi [CQ:face,id=178]`
//!
//! Both decode to the same value; serialization always emits the array form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use qqbot_core::FormattedContent;

use super::segment::{SEGMENT_TYPES, Segment, unescape_cq};

const CQ_OPEN: &str = "[CQ:";

/// An ordered sequence of content segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Content {
    segments: Vec<Segment>,
}

impl FormattedContent for Content {
    type Segment = Segment;

    fn as_slice(&self) -> &[Segment] {
        &self.segments
    }
}

impl Serialize for Content {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.segments.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Array(Vec<Segment>),
            String(String),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Array(segments) => Content { segments },
            Shape::String(cq) => Content::from_cq_string(&cq),
        })
    }
}

impl Content {
    /// Creates empty content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates content holding a single text segment.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::text(text)],
        }
    }

    /// Parses CQ-coded text.
    pub fn from_cq_string(input: &str) -> Self {
        Self {
            segments: parse_cq_string(input),
        }
    }

    /// Decodes a raw wire value, accepting either known shape.
    ///
    /// Returns `None` when the value is neither a segment array nor a string.
    /// Within an array, a missing or `null` `data` reads as empty, segments of
    /// unmodeled types are kept as [`Segment::Unknown`], and a modeled segment
    /// with ill-formed data is skipped. An element without a `type` tag
    /// rejects the array.
    pub fn decode_lenient(value: &Value) -> Option<Self> {
        match value {
            Value::String(cq) => Some(Self::from_cq_string(cq)),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| {
                    let Some(seg_type) = item.get("type").and_then(Value::as_str) else {
                        return Some(None);
                    };
                    match decode_segment(item) {
                        Ok(Segment::Unknown(_)) if SEGMENT_TYPES.contains(&seg_type) => {
                            debug!(seg_type, "Skipping ill-formed segment");
                            None
                        }
                        Ok(segment) => Some(Some(segment)),
                        Err(e) => {
                            debug!(seg_type, error = %e, "Skipping ill-formed segment");
                            None
                        }
                    }
                })
                .collect::<Option<Vec<_>>>()
                .map(|segments| Self { segments }),
            _ => None,
        }
    }

    /// Encodes the content as CQ-coded text.
    pub fn to_cq_string(&self) -> String {
        self.segments.iter().map(Segment::to_cq_code).collect()
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Consumes the content, returning its segments.
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    // --------------------------------
    // Builder methods
    // --------------------------------

    /// Appends a text segment.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::text(text));
        self
    }

    /// Appends a mention.
    pub fn at(mut self, qq: i64) -> Self {
        self.segments.push(Segment::at(qq));
        self
    }

    /// Appends a QQ face.
    pub fn face(mut self, id: i32) -> Self {
        self.segments.push(Segment::face(id));
        self
    }

    /// Appends an image.
    pub fn image(mut self, file: impl Into<String>) -> Self {
        self.segments.push(Segment::image(file));
        self
    }

    /// Appends a reply marker.
    pub fn reply(mut self, message_id: i64) -> Self {
        self.segments.push(Segment::reply(message_id));
        self
    }

    /// Appends an arbitrary segment.
    pub fn push(&mut self, segment: Segment) -> &mut Self {
        self.segments.push(segment);
        self
    }

    // --------------------------------
    // Queries
    // --------------------------------

    /// Returns the QQ numbers of all individually mentioned users.
    pub fn mentioned_users(&self) -> Vec<i64> {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::At(data) if !data.is_all() => data.qq.parse().ok(),
                _ => None,
            })
            .collect()
    }

    /// Returns true if the content mentions everyone.
    pub fn mentions_all(&self) -> bool {
        self.segments
            .iter()
            .any(|seg| matches!(seg, Segment::At(data) if data.is_all()))
    }

    /// Returns the id of the message being replied to, if any.
    pub fn reply_to(&self) -> Option<&str> {
        self.segments.iter().find_map(|seg| match seg {
            Segment::Reply(data) => Some(data.id.as_str()),
            _ => None,
        })
    }
}

impl From<Vec<Segment>> for Content {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

impl From<Segment> for Content {
    fn from(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::from_text(text)
    }
}

impl FromIterator<Segment> for Content {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Content {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

// ============================================================================
// CQ String Parsing
// ============================================================================

/// Parses CQ-coded text into segments.
///
/// Unknown functions become [`Segment::Unknown`]. A modeled code missing a
/// required parameter is kept as literal text, and so is an unterminated
/// `[CQ:`.
pub fn parse_cq_string(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let Some(start) = rest.find(CQ_OPEN) else {
            push_text(&mut segments, &unescape_cq(rest));
            break;
        };
        push_text(&mut segments, &unescape_cq(&rest[..start]));

        let code = &rest[start..];
        let Some(end) = code.find(']') else {
            push_text(&mut segments, code);
            break;
        };

        let body = &code[CQ_OPEN.len()..end];
        let mut parts = body.split(',');
        let func = parts.next().unwrap_or_default();
        let params: Vec<(String, String)> = parts
            .filter_map(|part| part.split_once('='))
            .map(|(k, v)| (k.to_string(), unescape_cq(v)))
            .collect();

        match Segment::from_cq_parts(func, &params) {
            Some(segment) => segments.push(segment),
            None => push_text(&mut segments, &code[..=end]),
        }
        rest = &code[end + 1..];
    }

    segments
}

/// Decodes one array element, reading a missing or `null` `data` as `{}`.
fn decode_segment(item: &Value) -> serde_json::Result<Segment> {
    if item.get("data").is_some_and(|data| !data.is_null()) {
        return Segment::deserialize(item);
    }
    let mut item = item.clone();
    if let Value::Object(fields) = &mut item {
        fields.insert("data".to_string(), Value::Object(Map::new()));
    }
    Segment::deserialize(&item)
}

/// Pushes text, merging it into a preceding text segment.
fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(last)) = segments.last_mut() {
        last.text.push_str(text);
    } else {
        segments.push(Segment::text(text));
    }
}
