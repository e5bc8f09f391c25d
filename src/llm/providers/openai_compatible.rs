use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::{sanitize_for_log, ReasoningClient};
use crate::llm::sse_parser::{self, SseEvent};
use crate::llm::types::{
    ReasoningRequest, ReasoningResponse, Segment, StopReason, ToolCall, ToolDef, Turn,
};

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> PilotResult<Self> {
        Self::with_timeout(id, api_base, api_key, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Every request, streamed body included, is abandoned after `timeout`.
    pub fn with_timeout(
        id: String,
        api_base: String,
        api_key: String,
        timeout: Duration,
    ) -> PilotResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ReasoningClient for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn ask(&self, request: ReasoningRequest<'_>) -> PilotResult<ReasoningResponse> {
        let cfg = request.config;
        let mut body = serde_json::json!({
            "model": cfg.model,
            "messages": to_api_messages(request.system, request.turns),
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(to_api_tools(request.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            "sending LLM request"
        );
        tracing::trace!(body = %sanitize_for_log(&body), "request body (sanitized, base64 omitted)");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::Transport(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Accumulate an SSE response into a complete reasoning response.
    async fn handle_stream(&self, response: reqwest::Response) -> PilotResult<ReasoningResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut line_buf = String::new();

        let mut content = String::new();
        let mut reasoning = String::new();
        let mut finish_reason: Option<String> = None;
        let mut builders: BTreeMap<usize, ToolCallBuilder> = BTreeMap::new();

        'stream: while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk?;
            line_buf.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = line_buf.find('\n') {
                let line = line_buf[..pos].trim().to_string();
                line_buf.drain(..=pos);

                let events = match sse_parser::parse_sse_line(&line) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::debug!("SSE parse skipped: {e}");
                        continue;
                    }
                };
                for event in events {
                    match event {
                        SseEvent::Reasoning(text) => reasoning.push_str(&text),
                        SseEvent::Content(text) => content.push_str(&text),
                        SseEvent::ToolCallDeltas(deltas) => merge_tool_call_deltas(&deltas, &mut builders),
                        SseEvent::Finish(reason) => finish_reason = Some(reason),
                        SseEvent::Done => break 'stream,
                    }
                }
            }
        }

        let tool_calls = build_tool_calls(builders)?;

        tracing::info!(
            content_len = content.len(),
            reasoning_len = reasoning.len(),
            tool_calls = tool_calls.len(),
            tools = ?tool_calls.iter().map(|tc| tc.name.as_str()).collect::<Vec<_>>(),
            "LLM stream complete"
        );

        Ok(assemble(content, tool_calls, finish_reason.as_deref()))
    }

    /// Handle a non-streaming JSON response.
    async fn handle_json(&self, response: reqwest::Response) -> PilotResult<ReasoningResponse> {
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PilotError::Transport(format!("malformed response: {e}")))?;
        let message = &json["choices"][0]["message"];
        if message.is_null() {
            return Err(PilotError::Transport("response has no choices".into()));
        }

        let content = message["content"].as_str().unwrap_or("").to_string();
        let mut tool_calls = Vec::new();
        for tc in message["tool_calls"].as_array().into_iter().flatten() {
            let (Some(id), Some(name)) = (tc["id"].as_str(), tc["function"]["name"].as_str())
            else {
                return Err(PilotError::Transport(format!(
                    "malformed tool call without id or name: {tc}"
                )));
            };
            tool_calls.push(ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input: parse_arguments(tc["function"]["arguments"].as_str().unwrap_or("{}"))?,
            });
        }

        tracing::info!(
            content_len = content.len(),
            tool_calls = tool_calls.len(),
            "LLM JSON response received"
        );

        Ok(assemble(
            content,
            tool_calls,
            json["choices"][0]["finish_reason"].as_str(),
        ))
    }
}

fn assemble(content: String, tool_calls: Vec<ToolCall>, finish: Option<&str>) -> ReasoningResponse {
    let mut segments = Vec::with_capacity(tool_calls.len() + 1);
    if !content.is_empty() {
        segments.push(Segment::Text { text: content });
    }
    let has_tools = !tool_calls.is_empty();
    segments.extend(tool_calls.into_iter().map(Segment::ToolCall));
    let stop_reason = match finish {
        Some(reason) => StopReason::from_wire(reason),
        None if has_tools => StopReason::ToolUse,
        None => StopReason::EndTurn,
    };
    ReasoningResponse {
        segments,
        stop_reason,
    }
}

fn parse_arguments(raw: &str) -> PilotResult<serde_json::Value> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| PilotError::Transport(format!("malformed tool arguments {raw:?}: {e}")))
}

fn to_api_messages(system: &str, turns: &[Turn]) -> Vec<serde_json::Value> {
    let mut messages = vec![serde_json::json!({"role": "system", "content": system})];
    for turn in turns {
        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        for segment in &turn.segments {
            match segment {
                Segment::Text { text } => {
                    parts.push(serde_json::json!({"type": "text", "text": text}))
                }
                Segment::Image { image } => parts.push(serde_json::json!({
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", image.media_type, image.to_base64()),
                    },
                })),
                Segment::ToolCall(tc) => tool_calls.push(serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.input.to_string(),
                    },
                })),
                // Tool outcomes must directly follow the assistant message that requested them.
                Segment::ToolResult {
                    tool_call_id,
                    content,
                    ..
                } => messages.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                })),
            }
        }

        match turn.role {
            crate::llm::types::Role::Reasoner => {
                let text = turn.text();
                let mut msg = serde_json::json!({"role": "assistant", "content": text});
                if !tool_calls.is_empty() {
                    msg["tool_calls"] = serde_json::Value::Array(tool_calls);
                }
                messages.push(msg);
            }
            crate::llm::types::Role::Observer => {
                if !parts.is_empty() {
                    messages.push(serde_json::json!({"role": "user", "content": parts}));
                }
            }
        }
    }
    messages
}

fn to_api_tools(tools: &[ToolDef]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                },
            })
        })
        .collect()
}

#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

/// Merge streaming tool-call delta fragments into the accumulator map (keyed by delta index).
fn merge_tool_call_deltas(deltas: &[serde_json::Value], builders: &mut BTreeMap<usize, ToolCallBuilder>) {
    for delta in deltas {
        let idx = delta["index"].as_u64().unwrap_or(0) as usize;
        let entry = builders.entry(idx).or_default();

        if let Some(id) = delta["id"].as_str() {
            if !id.is_empty() {
                entry.id = id.to_string();
            }
        }
        if let Some(name) = delta["function"]["name"].as_str() {
            entry.name.push_str(name);
        }
        if let Some(args) = delta["function"]["arguments"].as_str() {
            entry.arguments.push_str(args);
        }
    }
}

fn build_tool_calls(builders: BTreeMap<usize, ToolCallBuilder>) -> PilotResult<Vec<ToolCall>> {
    builders
        .into_values()
        .map(|b| {
            if b.id.is_empty() || b.name.is_empty() {
                return Err(PilotError::Transport(format!(
                    "malformed streamed tool call (id {:?}, name {:?})",
                    b.id, b.name
                )));
            }
            Ok(ToolCall {
                input: parse_arguments(&b.arguments)?,
                id: b.id,
                name: b.name,
            })
        })
        .collect()
}
