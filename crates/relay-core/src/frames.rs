//! Wire frames.
//!
//! One JSON text message per frame, in both directions. Frames carry no
//! sequence numbers; ordering comes from the transport.
//!
//! Client → server:
//!
//! | Shape | Meaning |
//! |---|---|
//! | `{"type":"config","config":"<backend-id>"}` | select backend |
//! | `{"content":"…"}` (type absent or `question`) | ask |
//! | `"…"`, a JSON scalar, or non-JSON text | ask (plain text) |
//!
//! Server → client: `chunk`, `end`, `error`, `system` (see [`OutboundFrame`]).

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::FrameError;

/// A frame received from the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// Select the answer backend. The id is validated by the dispatcher so an
    /// unknown value can be reported back to the client.
    Config {
        /// Raw backend identifier.
        backend: String,
    },
    /// Ask a question. Content is never empty.
    Question {
        /// Question text.
        content: String,
    },
}

/// Frame types whose payload is a question.
const QUESTION_TYPES: [&str; 4] = ["question", "message", "user", "content"];

/// Parse one inbound text frame.
///
/// Returns `Ok(None)` for a well-formed frame with nothing to do (blank
/// question). Errors are for logging only; the caller drops the frame.
pub fn parse_inbound(text: &str) -> Result<Option<InboundFrame>, FrameError> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Ok(question(text));
    };

    match value {
        Value::String(s) => Ok(question(&s)),
        Value::Object(map) => parse_object(&map),
        // Text such as `42` or `true` happens to be JSON but is still typed text.
        Value::Number(_) | Value::Bool(_) | Value::Null => Ok(question(text)),
        Value::Array(_) => Err(FrameError::Unsupported),
    }
}

/// Parse a binary frame; clients that send text as bytes are accepted.
pub fn parse_inbound_bytes(data: &[u8]) -> Result<Option<InboundFrame>, FrameError> {
    let text = std::str::from_utf8(data).map_err(|_| FrameError::InvalidEncoding)?;
    parse_inbound(text)
}

fn parse_object(map: &Map<String, Value>) -> Result<Option<InboundFrame>, FrameError> {
    let kind = match map.get("type") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => return Err(FrameError::UnknownType(other.to_string())),
    };

    match kind {
        Some("config") => {
            let backend = map
                .get("config")
                .and_then(Value::as_str)
                .ok_or(FrameError::MissingField("config"))?;
            Ok(Some(InboundFrame::Config {
                backend: backend.to_owned(),
            }))
        }
        None => {
            let content = map.get("content").ok_or(FrameError::MissingField("content"))?;
            Ok(question(&content_text(content)?))
        }
        Some(t) if QUESTION_TYPES.contains(&t) => {
            let content = map.get("content").ok_or(FrameError::MissingField("content"))?;
            Ok(question(&content_text(content)?))
        }
        Some(other) => Err(FrameError::UnknownType(other.to_owned())),
    }
}

/// Flatten `content` into text. Accepts a string or an array of parts where
/// each part is a string or `{"type":"text","text":"…"}`; non-text parts are
/// skipped.
fn content_text(content: &Value) -> Result<String, FrameError> {
    match content {
        Value::String(s) => Ok(s.clone()),
        Value::Array(parts) => Ok(parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => {
                    let is_text = obj
                        .get("type")
                        .and_then(Value::as_str)
                        .is_none_or(|t| t == "text");
                    if is_text {
                        obj.get("text").and_then(Value::as_str)
                    } else {
                        None
                    }
                }
                _ => None,
            })
            .collect()),
        _ => Err(FrameError::MissingField("content")),
    }
}

/// Blank text is nothing to answer; anything else is kept as sent.
fn question(text: &str) -> Option<InboundFrame> {
    (!text.trim().is_empty()).then(|| InboundFrame::Question {
        content: text.to_owned(),
    })
}

/// A frame sent to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame {
    /// One incremental answer fragment.
    Chunk(String),
    /// Stream complete; carries the full accumulated answer.
    End(String),
    /// The request failed; carries a user-safe message.
    Error(String),
    /// Idle keep-alive prompt.
    System(String),
}

impl OutboundFrame {
    /// Wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chunk(_) => "chunk",
            Self::End(_) => "end",
            Self::Error(_) => "error",
            Self::System(_) => "system",
        }
    }

    /// Wire `role`. System reminders carry none.
    pub fn role(&self) -> Option<&'static str> {
        match self {
            Self::Chunk(_) | Self::End(_) => Some("ai"),
            Self::Error(_) => Some("system"),
            Self::System(_) => None,
        }
    }

    /// Frame text.
    pub fn content(&self) -> &str {
        match self {
            Self::Chunk(c) | Self::End(c) | Self::Error(c) | Self::System(c) => c,
        }
    }

    /// Encode as a JSON text message.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for OutboundFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let role = self.role();
        let mut map = serializer.serialize_map(Some(if role.is_some() { 3 } else { 2 }))?;
        map.serialize_entry("type", self.kind())?;
        if let Some(role) = role {
            map.serialize_entry("role", role)?;
        }
        map.serialize_entry("content", self.content())?;
        map.end()
    }
}
