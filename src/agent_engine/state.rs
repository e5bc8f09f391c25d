use serde::Serialize;

use crate::llm::types::Turn;

pub use crate::executor::actions::DoneStatus;

/// Lifecycle of one task. Terminal states are entered exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Cancelled | TaskState::Completed | TaskState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

impl From<DoneStatus> for Outcome {
    fn from(status: DoneStatus) -> Self {
        match status {
            DoneStatus::Completed => Outcome::Completed,
            DoneStatus::Failed => Outcome::Failed,
        }
    }
}

impl From<Outcome> for TaskState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => TaskState::Completed,
            Outcome::Failed => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }
}

/// Where the control loop currently is, reported through events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AgentPhase {
    Starting,
    Capturing,
    AwaitingModel,
    ExecutingTools,
    Paused,
    Terminal { outcome: Outcome },
}

/// A task goal plus its lifecycle state.
#[derive(Debug, Clone)]
pub struct Task {
    pub goal: String,
    state: TaskState,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            state: TaskState::Running,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Running → Paused. Ignored in any other state.
    pub fn pause(&mut self) {
        if self.state == TaskState::Running {
            self.state = TaskState::Paused;
        }
    }

    /// Paused → Running. Ignored in any other state.
    pub fn resume(&mut self) {
        if self.state == TaskState::Paused {
            self.state = TaskState::Running;
        }
    }

    /// Enter a terminal state. Returns false if the task had already finished.
    pub fn finish(&mut self, outcome: Outcome) -> bool {
        if self.state.is_terminal() {
            tracing::warn!(current = ?self.state, requested = ?outcome, "task already terminal");
            return false;
        }
        self.state = outcome.into();
        true
    }
}

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub success: bool,
    pub outcome: Outcome,
    pub reason: String,
    /// Underlying error text for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Every stored turn, in order.
    pub conversation: Vec<Turn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_is_set_once() {
        let mut task = Task::new("open settings");
        assert!(task.finish(Outcome::Completed));
        assert!(!task.finish(Outcome::Failed));
        assert_eq!(task.state(), TaskState::Completed);
        task.resume();
        task.pause();
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut task = Task::new("x");
        task.pause();
        task.pause();
        assert_eq!(task.state(), TaskState::Paused);
        task.resume();
        task.resume();
        assert_eq!(task.state(), TaskState::Running);
    }

    #[test]
    fn done_status_maps_to_outcome() {
        assert_eq!(Outcome::from(DoneStatus::Failed), Outcome::Failed);
        assert_eq!(TaskState::from(Outcome::Cancelled), TaskState::Cancelled);
    }

    #[test]
    fn phase_serializes_with_tag() {
        let json = serde_json::to_value(AgentPhase::Terminal { outcome: Outcome::Failed }).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "terminal", "outcome": "failed"}));
    }
}
