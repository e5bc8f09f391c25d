use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::event_bus::{AgentEvent, EventBus};
use crate::agent_engine::loop_control::LoopControl;
use crate::agent_engine::state::{Completion, Outcome};

/// Caller-side view of a running task.
///
/// The engine runs on its own tokio task; the handle only flips the shared
/// pause/cancel flags and collects the final [`Completion`].
pub struct AgentHandle {
    control: Arc<LoopControl>,
    events: EventBus,
    worker: JoinHandle<Completion>,
}

impl AgentHandle {
    /// Spawn `engine` on a dedicated task working toward `task`.
    /// Subscribe through `engine.events()` beforehand to see the first events.
    pub fn start(engine: AgentEngine, task: impl Into<String>) -> Self {
        let control = engine.control();
        let events = engine.events().clone();
        let goal = task.into();
        let worker = tokio::spawn(async move { engine.run(&goal).await });
        Self {
            control,
            events,
            worker,
        }
    }

    /// Takes effect at the next iteration boundary.
    pub fn pause(&self) {
        tracing::info!("pause requested");
        self.control.pause();
    }

    pub fn resume(&self) {
        tracing::info!("resume requested");
        self.control.resume();
    }

    /// Takes effect at the next iteration boundary; in-flight work finishes first.
    pub fn cancel(&self) {
        tracing::info!("cancel requested");
        self.control.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Wait for the worker to reach a terminal state.
    pub async fn wait(self) -> Completion {
        match self.worker.await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!(error = %e, "agent worker stopped unexpectedly");
                Completion {
                    success: false,
                    outcome: Outcome::Failed,
                    reason: "agent worker stopped unexpectedly".into(),
                    detail: Some(e.to_string()),
                    conversation: Vec::new(),
                }
            }
        }
    }
}
