use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Which side of the conversation produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    Observer,
    #[serde(rename = "assistant")]
    Reasoner,
}

impl Role {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::Observer => "user",
            Role::Reasoner => "assistant",
        }
    }
}

/// An encoded screenshot. The payload is shared, so cloning a turn or
/// re-sending an observation never copies pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub media_type: String,
    pub data: Arc<[u8]>,
}

impl EncodedImage {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            media_type: "image/jpeg".into(),
            data: Arc::from(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn file_extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

// Payloads never go into logs or JSON records; only their size does.
impl Serialize for EncodedImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("EncodedImage", 2)?;
        s.serialize_field("media_type", &self.media_type)?;
        s.serialize_field("bytes", &self.data.len())?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Image { image: EncodedImage },
    ToolCall(ToolCall),
    ToolResult {
        tool_call_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text { text: text.into() }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Segment::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }
}

/// One immutable entry of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub segments: Vec<Segment>,
}

impl Turn {
    pub fn observer(segments: Vec<Segment>) -> Self {
        Self {
            role: Role::Observer,
            segments,
        }
    }

    pub fn reasoner(segments: Vec<Segment>) -> Self {
        Self {
            role: Role::Reasoner,
            segments,
        }
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolCall(tc) => Some(tc),
            _ => None,
        })
    }

    /// `(tool_call_id, content)` of every tool result in this turn, in order.
    pub fn tool_results(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolResult {
                tool_call_id,
                content,
                ..
            } => Some((tool_call_id.as_str(), content.as_str())),
            _ => None,
        })
    }

    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &EncodedImage> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Image { image } => Some(image),
            _ => None,
        })
    }
}

/// Declared action schema as sent to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ToolUse,
    EndTurn,
    MaxTokens,
    Other(String),
}

impl StopReason {
    /// Maps both Anthropic (`tool_use`, `end_turn`) and OpenAI (`tool_calls`, `stop`)
    /// spellings onto one enum.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "tool_use" | "tool_calls" | "function_call" => StopReason::ToolUse,
            "end_turn" | "stop" | "stop_sequence" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Per-call sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CallConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
}

/// Everything the remote service sees on one call. The service is stateless,
/// so the whole history travels every time.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningRequest<'a> {
    pub system: &'a str,
    pub turns: &'a [Turn],
    pub tools: &'a [ToolDef],
    pub config: &'a CallConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningResponse {
    pub segments: Vec<Segment>,
    pub stop_reason: StopReason,
}

impl ReasoningResponse {
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    pub fn narrative(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_turn(self) -> Turn {
        Turn::reasoner(self.segments)
    }
}
