use serde::Serialize;
use tokio::sync::broadcast;

use crate::agent_engine::state::{AgentPhase, Completion};
use crate::llm::types::EncodedImage;
use crate::perception::types::Point;

/// Progress notifications published by the control loop.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    PhaseChanged { phase: AgentPhase },
    Log { message: String },
    /// Narrative text from the reasoning service.
    Narrative { text: String },
    ToolExecuted {
        name: String,
        input: serde_json::Value,
        result: String,
    },
    Screenshot { image: EncodedImage, anchor: Point },
    Completed { completion: Completion },
}

/// Broadcast fan-out of [`AgentEvent`]s. Slow subscribers lag and drop
/// events; the worker never blocks on them.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AgentEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(AgentEvent::Log {
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(AgentEvent::PhaseChanged { phase: AgentPhase::Starting });
        bus.log("hello");

        assert!(matches!(
            rx.recv().await.unwrap(),
            AgentEvent::PhaseChanged { phase: AgentPhase::Starting }
        ));
        match rx.recv().await.unwrap() {
            AgentEvent::Log { message } => assert_eq!(message, "hello"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        EventBus::new(4).log("nobody listening");
    }
}
