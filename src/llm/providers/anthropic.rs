//! Anthropic Messages API adapter.
//!
//! System prompt goes in the top-level `system` field, tool calls travel as
//! `tool_use` blocks and their outcomes as `tool_result` blocks inside the
//! next user message. Screenshots are sent as base64 `image` blocks.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::{sanitize_for_log, ReasoningClient};
use crate::llm::types::{
    ReasoningRequest, ReasoningResponse, Segment, StopReason, ToolCall, ToolDef, Turn,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const EMPTY_TURN_PLACEHOLDER: &str = "(no content)";

pub struct AnthropicProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> PilotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            id,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        if self.api_base.ends_with("/v1/messages") {
            self.api_base.clone()
        } else {
            format!("{}/v1/messages", self.api_base)
        }
    }

    fn build_body(request: &ReasoningRequest<'_>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.config.model,
            "max_tokens": request.config.max_tokens,
            "temperature": request.config.temperature,
            "system": request.system,
            "messages": to_api_messages(request.turns),
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(to_api_tools(request.tools));
        }
        body
    }
}

#[async_trait]
impl ReasoningClient for AnthropicProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn ask(&self, request: ReasoningRequest<'_>) -> PilotResult<ReasoningResponse> {
        let body = Self::build_body(&request);

        tracing::debug!(
            provider = %self.id,
            model = %request.config.model,
            turns = request.turns.len(),
            "sending Anthropic request"
        );
        tracing::trace!(body = %sanitize_for_log(&body), "request body (sanitized)");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.id, %status, "Anthropic API error");
            return Err(PilotError::Transport(format!("{}: {}", status, err_body)));
        }

        let api_resp: ApiResponse = response
            .json()
            .await
            .map_err(|e| PilotError::Transport(format!("malformed Anthropic response: {e}")))?;

        let parsed = from_api_response(api_resp);
        tracing::info!(
            provider = %self.id,
            tool_calls = parsed.tool_calls().len(),
            stop_reason = ?parsed.stop_reason,
            "Anthropic response received"
        );
        Ok(parsed)
    }
}

fn to_api_messages(turns: &[Turn]) -> Vec<serde_json::Value> {
    turns
        .iter()
        .map(|turn| {
            let mut blocks: Vec<serde_json::Value> = turn
                .segments
                .iter()
                .map(|segment| match segment {
                    Segment::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    Segment::Image { image } => serde_json::json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.media_type,
                            "data": image.to_base64(),
                        },
                    }),
                    Segment::ToolCall(tc) => serde_json::json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.input,
                    }),
                    Segment::ToolResult {
                        tool_call_id,
                        content,
                        is_error,
                    } => {
                        let mut block = serde_json::json!({
                            "type": "tool_result",
                            "tool_use_id": tool_call_id,
                            "content": content,
                        });
                        if *is_error {
                            block["is_error"] = serde_json::Value::Bool(true);
                        }
                        block
                    }
                })
                .collect();
            // The Messages API rejects empty content, including empty text blocks.
            if blocks.is_empty() {
                blocks.push(serde_json::json!({"type": "text", "text": EMPTY_TURN_PLACEHOLDER}));
            }
            serde_json::json!({
                "role": turn.role.as_wire(),
                "content": blocks,
            })
        })
        .collect()
}

fn to_api_tools(tools: &[ToolDef]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

fn from_api_response(resp: ApiResponse) -> ReasoningResponse {
    let segments = resp
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiBlock::Text { text } => Some(Segment::Text { text }),
            ApiBlock::ToolUse { id, name, input } => {
                let input = if input.is_null() {
                    serde_json::json!({})
                } else {
                    input
                };
                Some(Segment::ToolCall(ToolCall { id, name, input }))
            }
            ApiBlock::Unsupported => None,
        })
        .collect();
    let stop_reason = resp
        .stop_reason
        .as_deref()
        .map(StopReason::from_wire)
        .unwrap_or(StopReason::EndTurn);
    ReasoningResponse {
        segments,
        stop_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{CallConfig, EncodedImage};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn call_config() -> CallConfig {
        CallConfig {
            model: "claude-3-5-sonnet-20241022".into(),
            max_tokens: 2048,
            temperature: 0.7,
            stream: false,
        }
    }

    fn sample_turns() -> Vec<Turn> {
        vec![
            Turn::observer(vec![
                Segment::text("Here's the current screenshot"),
                Segment::Image {
                    image: EncodedImage::jpeg(vec![1, 2, 3]),
                },
            ]),
            Turn::reasoner(vec![
                Segment::text("<thinking>tap it</thinking>"),
                Segment::ToolCall(ToolCall {
                    id: "toolu_1".into(),
                    name: "tap".into(),
                    input: serde_json::json!({"x": 10, "y": 20}),
                }),
            ]),
            Turn::observer(vec![
                Segment::tool_result("toolu_1", "Tapped at (10, 20)."),
                Segment::text("latest screenshot"),
            ]),
        ]
    }

    #[test]
    fn message_conversion_uses_content_blocks() {
        let msgs = to_api_messages(&sample_turns());
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["content"][1]["type"], "image");
        assert_eq!(msgs[0]["content"][1]["source"]["data"], "AQID");
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[1]["content"][1]["type"], "tool_use");
        assert_eq!(msgs[1]["content"][1]["input"]["y"], 20);
        assert_eq!(msgs[2]["content"][0]["type"], "tool_result");
        assert_eq!(msgs[2]["content"][0]["tool_use_id"], "toolu_1");
        assert!(msgs[2]["content"][0].get("is_error").is_none());
    }

    #[test]
    fn empty_reasoner_turn_gets_a_text_block() {
        let turns = vec![
            Turn::observer(vec![Segment::text("look")]),
            Turn::reasoner(Vec::new()),
        ];
        let msgs = to_api_messages(&turns);
        let content = msgs[1]["content"].as_array().unwrap();
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        assert!(!content[0]["text"].as_str().unwrap().is_empty());
    }

    #[test]
    fn parse_tool_use_response_keeps_order() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Two steps"},
                    {"type": "tool_use", "id": "a", "name": "tap", "input": {"x": 1, "y": 2}},
                    {"type": "tool_use", "id": "b", "name": "press_key", "input": {"key": "back"}}
                ],
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();
        let parsed = from_api_response(resp);
        assert_eq!(parsed.stop_reason, StopReason::ToolUse);
        assert_eq!(parsed.narrative(), "Two steps");
        let names: Vec<_> = parsed.tool_calls().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["tap", "press_key"]);
    }

    #[tokio::test]
    async fn ask_posts_messages_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "Settings is open."},
                    {"type": "tool_use", "id": "toolu_9", "name": "done",
                     "input": {"status": "completed", "reason": "settings opened"}}
                ],
                "stop_reason": "tool_use"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new("anthropic".into(), server.uri(), "sk-test".into()).unwrap();
        let turns = sample_turns();
        let cfg = call_config();
        let tools = vec![ToolDef {
            name: "done".into(),
            description: "finish".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }];
        let resp = provider
            .ask(ReasoningRequest {
                system: "You control a phone.",
                turns: &turns,
                tools: &tools,
                config: &cfg,
            })
            .await
            .unwrap();

        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.tool_calls()[0].input["reason"], "settings opened");

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["system"], "You control a phone.");
        assert_eq!(body["tools"][0]["name"], "done");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn error_status_fails_closed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new("anthropic".into(), server.uri(), "sk-test".into()).unwrap();
        let cfg = call_config();
        let err = provider
            .ask(ReasoningRequest {
                system: "",
                turns: &[],
                tools: &[],
                config: &cfg,
            })
            .await
            .unwrap_err();
        match err {
            PilotError::Transport(msg) => assert!(msg.starts_with("529")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
