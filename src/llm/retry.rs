use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::provider::ReasoningClient;
use crate::llm::types::{ReasoningRequest, ReasoningResponse};

/// Bounded retry with exponential backoff around another client.
///
/// Only transient failures (timeouts, connection errors, 429 and 5xx) are
/// retried. After `max_retries` extra attempts the last error is returned, so
/// the caller still sees a terminal failure.
pub struct RetryingClient {
    inner: Arc<dyn ReasoningClient>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn ReasoningClient>, max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff,
        }
    }
}

#[async_trait]
impl ReasoningClient for RetryingClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn ask(&self, request: ReasoningRequest<'_>) -> PilotResult<ReasoningResponse> {
        let mut attempt = 0u32;
        let mut backoff = self.initial_backoff;
        loop {
            match self.inner.ask(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_retries && e.is_transient() => {
                    attempt += 1;
                    tracing::warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "transient reasoning failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PilotError;
    use crate::llm::types::{CallConfig, StopReason};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        transient: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReasoningClient for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn ask(&self, _request: ReasoningRequest<'_>) -> PilotResult<ReasoningResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                let msg = if self.transient { "503 Service Unavailable: x" } else { "400 Bad Request: x" };
                return Err(PilotError::Transport(msg.into()));
            }
            Ok(ReasoningResponse {
                segments: Vec::new(),
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    fn config() -> CallConfig {
        CallConfig {
            model: "m".into(),
            max_tokens: 10,
            temperature: 0.0,
            stream: false,
        }
    }

    async fn run(inner: Arc<Flaky>, max_retries: u32) -> PilotResult<ReasoningResponse> {
        let client = RetryingClient::new(inner, max_retries, Duration::from_millis(1));
        let cfg = config();
        client
            .ask(ReasoningRequest {
                system: "",
                turns: &[],
                tools: &[],
                config: &cfg,
            })
            .await
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        let inner = Arc::new(Flaky { failures: 2, transient: true, calls: AtomicU32::new(0) });
        assert!(run(inner.clone(), 2).await.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let inner = Arc::new(Flaky { failures: 5, transient: true, calls: AtomicU32::new(0) });
        assert!(run(inner.clone(), 2).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let inner = Arc::new(Flaky { failures: 1, transient: false, calls: AtomicU32::new(0) });
        assert!(run(inner.clone(), 3).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_budget_is_a_single_attempt() {
        let inner = Arc::new(Flaky { failures: 1, transient: true, calls: AtomicU32::new(0) });
        assert!(run(inner.clone(), 0).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
