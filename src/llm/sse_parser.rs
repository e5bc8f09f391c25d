use crate::errors::{PilotError, PilotResult};

/// One decoded event from an OpenAI-compatible chat-completions stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// Reasoning text (some models like DeepSeek expose this separately).
    Reasoning(String),
    Content(String),
    /// Raw `delta.tool_calls` fragments, merged later by index.
    ToolCallDeltas(Vec<serde_json::Value>),
    /// `finish_reason` of the first choice.
    Finish(String),
    Done,
}

/// Parses a raw SSE line (OpenAI-compatible format) into zero or more events.
/// Keep-alives, comments and non-data lines yield nothing.
pub fn parse_sse_line(line: &str) -> PilotResult<Vec<SseEvent>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(Vec::new());
    }

    let data = match line.strip_prefix("data:") {
        Some(d) => d.trim(),
        None => return Ok(Vec::new()),
    };

    if data == "[DONE]" {
        return Ok(vec![SseEvent::Done]);
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| PilotError::SseParsing(e.to_string()))?;

    let mut events = Vec::new();
    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(events);
    };
    let delta = &first["delta"];

    if let Some(reasoning) = delta["reasoning_content"].as_str() {
        if !reasoning.is_empty() {
            events.push(SseEvent::Reasoning(reasoning.to_string()));
        }
    }

    if let Some(content) = delta["content"].as_str() {
        if !content.is_empty() {
            events.push(SseEvent::Content(content.to_string()));
        }
    }

    if let Some(tool_calls) = delta["tool_calls"].as_array() {
        if !tool_calls.is_empty() {
            events.push(SseEvent::ToolCallDeltas(tool_calls.clone()));
        }
    }

    if let Some(reason) = first["finish_reason"].as_str() {
        events.push(SseEvent::Finish(reason.to_string()));
    }

    Ok(events)
}
