use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::types::{ReasoningRequest, ReasoningResponse};

/// A remote vision-capable reasoning service.
///
/// Implementations are stateless per call and fail closed: any transport,
/// status or decode problem comes back as an error and is never retried here.
/// Retrying is layered on with [`crate::llm::retry::RetryingClient`].
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Returns the provider's identifier (matches the config.toml key).
    fn name(&self) -> &str;

    async fn ask(&self, request: ReasoningRequest<'_>) -> PilotResult<ReasoningResponse>;
}

/// Replace base64 image payloads in a request body before it is logged.
pub(crate) fn sanitize_for_log(body: &serde_json::Value) -> String {
    fn scrub(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, v) in map.iter_mut() {
                    let is_payload = matches!(key.as_str(), "data" | "url")
                        && v.as_str().map(|s| s.len() > 256).unwrap_or(false);
                    if is_payload {
                        *v = serde_json::Value::String("<omitted_base64_image>".into());
                    } else {
                        scrub(v);
                    }
                }
            }
            serde_json::Value::Array(items) => items.iter_mut().for_each(scrub),
            _ => {}
        }
    }

    let mut log_body = body.clone();
    scrub(&mut log_body);
    serde_json::to_string(&log_body).unwrap_or_default()
}
