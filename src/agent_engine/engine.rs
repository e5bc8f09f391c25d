use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::conversation::ConversationStore;
use crate::agent_engine::event_bus::{AgentEvent, EventBus};
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::{Checkpoint, LoopControl};
use crate::agent_engine::state::{AgentPhase, Completion, Outcome, Task};
use crate::config::SessionConfig;
use crate::errors::PilotError;
use crate::executor::actions::DeviceAction;
use crate::executor::registry::ActionRegistry;
use crate::llm::provider::ReasoningClient;
use crate::llm::types::{CallConfig, ReasoningRequest, Segment, StopReason, ToolCall, Turn};
use crate::perception::traits::CaptureGateway;
use crate::perception::types::Observation;

pub const REASON_CAPTURE_FAILED: &str = "screenshot capture failed";
pub const REASON_TRANSPORT_FAILED: &str = "failed to communicate with remote service";
pub const REASON_CANCELLED: &str = "task cancelled";

/// Timing and size limits for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub max_turns: usize,
    pub iteration_delay: Duration,
    pub pause_poll: Duration,
}

impl SessionSettings {
    pub fn from_config(session: &SessionConfig) -> Self {
        Self {
            max_turns: session.max_turns,
            iteration_delay: Duration::from_millis(session.iteration_delay_ms),
            pause_poll: Duration::from_millis(session.pause_poll_ms),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Why the loop stopped, before it is turned into a [`Completion`].
struct Termination {
    outcome: Outcome,
    reason: String,
    detail: Option<String>,
}

impl Termination {
    fn done(outcome: Outcome, reason: String) -> Self {
        Self {
            outcome,
            reason,
            detail: None,
        }
    }

    fn failed(reason: impl Into<String>, error: &PilotError) -> Self {
        Self {
            outcome: Outcome::Failed,
            reason: reason.into(),
            detail: Some(error.to_string()),
        }
    }

    fn cancelled() -> Self {
        Self {
            outcome: Outcome::Cancelled,
            reason: REASON_CANCELLED.into(),
            detail: None,
        }
    }
}

/// The perception–action controller.
///
/// One call to [`AgentEngine::run`] drives a single task to a terminal state:
/// capture, ask the reasoning service, execute the returned actions, repeat.
/// Every failure is terminal; nothing is retried here.
pub struct AgentEngine {
    client: Arc<dyn ReasoningClient>,
    call_config: CallConfig,
    capture: Arc<dyn CaptureGateway>,
    actions: ActionRegistry,
    system_prompt: String,
    settings: SessionSettings,
    events: EventBus,
    control: Arc<LoopControl>,
    history: Option<SessionHistory>,
}

impl AgentEngine {
    pub fn new(
        client: Arc<dyn ReasoningClient>,
        call_config: CallConfig,
        capture: Arc<dyn CaptureGateway>,
        actions: ActionRegistry,
        system_prompt: String,
        settings: SessionSettings,
    ) -> Self {
        Self {
            client,
            call_config,
            capture,
            actions,
            system_prompt,
            settings,
            events: EventBus::default(),
            control: Arc::new(LoopControl::new()),
            history: None,
        }
    }

    /// Mirror every stored turn into a JSONL audit log.
    pub fn with_history(mut self, history: SessionHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn control(&self) -> Arc<LoopControl> {
        self.control.clone()
    }

    /// Run `goal` until the reasoning service ends it, a failure occurs, or
    /// cancellation is observed at an iteration boundary.
    pub async fn run(&self, goal: &str) -> Completion {
        let mut task = Task::new(goal);
        let mut store = ConversationStore::new(self.settings.max_turns);
        tracing::info!(
            task = %goal,
            provider = %self.client.name(),
            model = %self.call_config.model,
            max_turns = self.settings.max_turns,
            profile = ?self.actions.profile(),
            "task started"
        );
        self.phase(AgentPhase::Starting);

        let termination = self.drive(&mut task, &mut store).await;
        self.finish(task, store, termination)
    }

    async fn drive(&self, task: &mut Task, store: &mut ConversationStore) -> Termination {
        // None means stale: capture before the next request.
        let mut observation: Option<Observation> = None;
        let mut pending_results: Vec<Segment> = Vec::new();
        let mut iteration: u32 = 0;

        loop {
            if iteration > 0 && !self.settings.iteration_delay.is_zero() {
                tokio::time::sleep(self.settings.iteration_delay).await;
            }
            iteration += 1;

            // ── Boundary: cancel / pause ────────────────────────────────────
            if self.control.is_cancelled() {
                return Termination::cancelled();
            }
            if self.control.is_paused() {
                task.pause();
                self.phase(AgentPhase::Paused);
                self.events.log("Task paused");
                tracing::info!(iteration, "paused at iteration boundary");
                if self.control.wait_while_paused(self.settings.pause_poll).await == Checkpoint::Cancelled {
                    return Termination::cancelled();
                }
                task.resume();
                self.events.log("Task resumed");
                tracing::info!(iteration, "resumed");
            }

            // ── Observe ─────────────────────────────────────────────────────
            let obs = match observation.take() {
                Some(obs) => obs,
                None => {
                    self.phase(AgentPhase::Capturing);
                    match self.capture.capture().await {
                        Ok(obs) => {
                            tracing::debug!(
                                iteration,
                                bytes = obs.image.len(),
                                anchor = %obs.anchor,
                                ui = obs.ui_description.is_some(),
                                "observation captured"
                            );
                            self.events.emit(AgentEvent::Screenshot {
                                image: obs.image.clone(),
                                anchor: obs.anchor,
                            });
                            obs
                        }
                        Err(e) => {
                            tracing::error!(iteration, error = %e, "capture failed");
                            return Termination::failed(REASON_CAPTURE_FAILED, &e);
                        }
                    }
                }
            };

            if let Err(e) = store.reserve_exchange() {
                tracing::warn!(turns = store.len(), error = %e, "no room for another exchange");
                return Termination::failed(e.to_string(), &e);
            }
            let after_tools = !pending_results.is_empty();
            let turn = observer_turn(
                &task.goal,
                &obs,
                std::mem::take(&mut pending_results),
                after_tools,
            );
            if let Err(term) = self.store(store, turn) {
                return term;
            }
            observation = Some(obs);

            // ── Ask ─────────────────────────────────────────────────────────
            self.phase(AgentPhase::AwaitingModel);
            let request = ReasoningRequest {
                system: &self.system_prompt,
                turns: store.turns(),
                tools: self.actions.tools(),
                config: &self.call_config,
            };
            let response = match self.client.ask(request).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(iteration, error = %e, "reasoning request failed");
                    return Termination::failed(REASON_TRANSPORT_FAILED, &e);
                }
            };

            let narrative = response.narrative();
            if !narrative.is_empty() {
                tracing::info!(iteration, text = %narrative, "reasoner narrative");
                self.events.emit(AgentEvent::Narrative { text: narrative });
            }
            let calls: Vec<ToolCall> = response.tool_calls().into_iter().cloned().collect();
            let stop_is_tool_use = response.stop_reason == StopReason::ToolUse;
            if stop_is_tool_use == calls.is_empty() {
                tracing::warn!(
                    stop_reason = ?response.stop_reason,
                    tool_calls = calls.len(),
                    "stop reason disagrees with response content"
                );
            }
            if let Err(term) = self.store(store, response.into_turn()) {
                return term;
            }

            if calls.is_empty() {
                tracing::debug!(iteration, "no tool calls, re-sending current observation");
                continue;
            }

            // ── Act ─────────────────────────────────────────────────────────
            if let Some(done) = calls.iter().find(|c| c.name == "done") {
                return match self.actions.parse(done) {
                    Ok(DeviceAction::Done { status, reason }) => {
                        if calls.len() > 1 {
                            tracing::info!(skipped = calls.len() - 1, "done ends the batch early");
                        }
                        Termination::done(status.into(), reason)
                    }
                    Ok(other) => {
                        let e = PilotError::Executor(format!("unexpected {} for done", other.name()));
                        Termination::failed(action_failure_reason(done, &e), &e)
                    }
                    Err(e) => Termination::failed(action_failure_reason(done, &e), &e),
                };
            }

            self.phase(AgentPhase::ExecutingTools);
            for call in &calls {
                match self.actions.execute(call).await {
                    Ok(result) => {
                        self.events.emit(AgentEvent::ToolExecuted {
                            name: call.name.clone(),
                            input: call.input.clone(),
                            result: result.clone(),
                        });
                        pending_results.push(Segment::tool_result(call.id.clone(), result));
                    }
                    Err(e) => {
                        tracing::error!(tool = %call.name, id = %call.id, error = %e, "action failed");
                        return Termination::failed(action_failure_reason(call, &e), &e);
                    }
                }
            }
            observation = None;
        }
    }

    /// Append a turn, turning a ceiling hit into a termination.
    fn store(&self, store: &mut ConversationStore, turn: Turn) -> Result<(), Termination> {
        let index = store.len();
        match store.append(turn) {
            Ok(()) => {
                if let (Some(history), Some(last)) = (&self.history, store.last()) {
                    history.record(index, last);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(turns = store.len(), error = %e, "conversation ceiling reached");
                Err(Termination::failed(e.to_string(), &e))
            }
        }
    }

    fn phase(&self, phase: AgentPhase) {
        tracing::debug!(?phase, "phase");
        self.events.emit(AgentEvent::PhaseChanged { phase });
    }

    fn finish(&self, mut task: Task, store: ConversationStore, term: Termination) -> Completion {
        task.finish(term.outcome);
        let completion = Completion {
            success: term.outcome == Outcome::Completed,
            outcome: term.outcome,
            reason: term.reason,
            detail: term.detail,
            conversation: store.into_turns(),
        };
        if completion.success {
            tracing::info!(reason = %completion.reason, turns = completion.conversation.len(), "task completed");
        } else {
            tracing::warn!(
                outcome = ?completion.outcome,
                reason = %completion.reason,
                detail = ?completion.detail,
                turns = completion.conversation.len(),
                "task ended without success"
            );
        }
        self.phase(AgentPhase::Terminal {
            outcome: completion.outcome,
        });
        self.events.emit(AgentEvent::Completed {
            completion: completion.clone(),
        });
        completion
    }
}

fn action_failure_reason(call: &ToolCall, error: &PilotError) -> String {
    match error {
        PilotError::UnknownTool(name) => format!("unknown tool: {name}"),
        other => format!("action {} failed: {other}", call.name),
    }
}

/// Tool results first, then the prompt, the UI summary and the screenshot.
fn observer_turn(goal: &str, obs: &Observation, results: Vec<Segment>, after_tools: bool) -> Turn {
    let mut segments = results;
    let prompt = if after_tools {
        format!(
            "Here's the latest screenshot after running the tool for the task: {goal}\n\
             Pointer position: {}.\n\
             Please analyze the image and suggest the next action.",
            obs.anchor
        )
    } else {
        format!(
            "Here's the current screenshot for the task: {goal}\n\
             Pointer position: {}.\n\
             Please analyze the image and suggest the next action.",
            obs.anchor
        )
    };
    segments.push(Segment::text(prompt));
    if let Some(ui) = &obs.ui_description {
        segments.push(Segment::text(ui.clone()));
    }
    segments.push(Segment::Image {
        image: obs.image.clone(),
    });
    Turn::observer(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::EncodedImage;
    use crate::perception::types::Point;

    fn obs(ui: Option<&str>) -> Observation {
        Observation {
            image: EncodedImage::jpeg(vec![1, 2, 3]),
            anchor: Point::new(10, 20),
            ui_description: ui.map(str::to_string),
        }
    }

    #[test]
    fn observer_turn_orders_segments() {
        let turn = observer_turn(
            "open settings",
            &obs(Some("UI elements:\n- \"Settings\"")),
            vec![Segment::tool_result("a", "Tapped at (1, 2).")],
            true,
        );
        assert!(matches!(turn.segments[0], Segment::ToolResult { .. }));
        assert!(matches!(&turn.segments[1], Segment::Text { text } if text.contains("after running the tool")));
        assert!(matches!(&turn.segments[2], Segment::Text { text } if text.starts_with("UI elements")));
        assert!(matches!(turn.segments[3], Segment::Image { .. }));
    }

    #[test]
    fn first_turn_names_the_task_and_pointer() {
        let turn = observer_turn("open settings", &obs(None), Vec::new(), false);
        assert_eq!(turn.segments.len(), 2);
        let text = turn.text();
        assert!(text.contains("for the task: open settings"));
        assert!(text.contains("Pointer position: (10, 20)."));
    }

    #[test]
    fn failure_reasons_by_class() {
        let call = ToolCall {
            id: "1".into(),
            name: "tap".into(),
            input: serde_json::json!({}),
        };
        assert_eq!(
            action_failure_reason(&call, &PilotError::UnknownTool("fly".into())),
            "unknown tool: fly"
        );
        assert_eq!(
            action_failure_reason(&call, &PilotError::Executor("device offline".into())),
            "action tap failed: Executor error: device offline"
        );
    }
}
