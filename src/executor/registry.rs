use std::sync::Arc;

use crate::config::ActionProfile;
use crate::errors::{PilotError, PilotResult};
use crate::executor::actions::DeviceAction;
use crate::executor::device::Device;
use crate::llm::tools::tools_for_profile;
use crate::llm::types::{ToolCall, ToolDef};

/// Validates tool calls against the active profile and dispatches them to a device.
pub struct ActionRegistry {
    device: Arc<dyn Device>,
    profile: ActionProfile,
    tools: Vec<ToolDef>,
}

impl ActionRegistry {
    pub fn new(device: Arc<dyn Device>, profile: ActionProfile) -> PilotResult<Self> {
        let tools = tools_for_profile(profile)?;
        tracing::debug!(
            device = %device.name(),
            ?profile,
            actions = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "action registry ready"
        );
        Ok(Self {
            device,
            profile,
            tools,
        })
    }

    pub fn profile(&self) -> ActionProfile {
        self.profile
    }

    /// Schemas offered to the reasoning service.
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Validate a call. Names outside the active profile are unknown.
    pub fn parse(&self, call: &ToolCall) -> PilotResult<DeviceAction> {
        if !self.tools.iter().any(|t| t.name == call.name) {
            return Err(PilotError::UnknownTool(call.name.clone()));
        }
        DeviceAction::parse(call)
    }

    /// Run one call and return the confirmation text fed back as its tool result.
    pub async fn execute(&self, call: &ToolCall) -> PilotResult<String> {
        let action = self.parse(call)?;
        tracing::info!(tool = %call.name, id = %call.id, input = %call.input, "executing action");

        let device = self.device.as_ref();
        let confirmation = match action {
            DeviceAction::MoveCursor { direction, distance } => {
                let (dx, dy) = direction.offset(distance);
                device.move_relative(dx, dy).await?;
                format!("Cursor moved {} by {distance} pixels.", direction.as_str())
            }
            DeviceAction::ClickCursor => {
                device.click().await?;
                "Click performed successfully.".to_string()
            }
            DeviceAction::Tap { at } => {
                device.tap(at).await?;
                format!("Tapped at {at}.")
            }
            DeviceAction::LongPress { at, duration_ms } => {
                device.long_press(at, duration_ms).await?;
                format!("Long pressed at {at} for {duration_ms} ms.")
            }
            DeviceAction::Swipe { from, to, duration_ms } => {
                device.swipe(from, to, duration_ms).await?;
                format!("Swiped from {from} to {to} over {duration_ms} ms.")
            }
            DeviceAction::InputText { at, text } => {
                device.input_text(at, &text).await?;
                format!("Entered text \"{text}\" at {at}.")
            }
            DeviceAction::PressKey { key } => {
                device.press_key(key).await?;
                format!("Pressed {} key.", key.as_str())
            }
            DeviceAction::Done { .. } => {
                return Err(PilotError::Executor(
                    "done ends the session and is never dispatched to a device".into(),
                ))
            }
        };

        tracing::debug!(tool = %call.name, result = %confirmation, "action complete");
        Ok(confirmation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::actions::SystemKey;
    use crate::perception::types::Point;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Device for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn move_relative(&self, dx: i32, dy: i32) -> PilotResult<()> {
            self.calls.lock().unwrap().push(format!("move {dx} {dy}"));
            Ok(())
        }

        async fn tap(&self, at: Point) -> PilotResult<()> {
            self.calls.lock().unwrap().push(format!("tap {} {}", at.x, at.y));
            Ok(())
        }

        async fn press_key(&self, key: SystemKey) -> PilotResult<()> {
            self.calls.lock().unwrap().push(format!("key {}", key.as_str()));
            Ok(())
        }
    }

    fn call(name: &str, input: serde_json::Value) -> ToolCall {
        ToolCall {
            id: format!("id_{name}"),
            name: name.into(),
            input,
        }
    }

    #[tokio::test]
    async fn confirmations_match_wire_text() {
        let device = Arc::new(Recorder::default());
        let registry = ActionRegistry::new(device.clone(), ActionProfile::Full).unwrap();

        assert_eq!(
            registry.execute(&call("move_cursor", json!({"direction": "down", "distance": 25}))).await.unwrap(),
            "Cursor moved down by 25 pixels."
        );
        assert_eq!(
            registry.execute(&call("tap", json!({"x": 120, "y": 340}))).await.unwrap(),
            "Tapped at (120, 340)."
        );
        assert_eq!(
            registry.execute(&call("press_key", json!({"key": "volume_up"}))).await.unwrap(),
            "Pressed volume_up key."
        );
        assert_eq!(
            *device.calls.lock().unwrap(),
            vec!["move 0 25", "tap 120 340", "key volume_up"]
        );
    }

    #[tokio::test]
    async fn actions_outside_profile_are_unknown() {
        let device = Arc::new(Recorder::default());
        let registry = ActionRegistry::new(device.clone(), ActionProfile::Cursor).unwrap();
        let err = registry.execute(&call("tap", json!({"x": 1, "y": 1}))).await.unwrap_err();
        assert!(matches!(err, PilotError::UnknownTool(ref n) if n == "tap"));
        assert!(device.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_primitive_is_an_executor_error() {
        let registry = ActionRegistry::new(Arc::new(Recorder::default()), ActionProfile::Full).unwrap();
        let err = registry.execute(&call("click_cursor", json!({}))).await.unwrap_err();
        assert!(matches!(err, PilotError::Executor(_)));
    }

    #[tokio::test]
    async fn done_is_never_dispatched() {
        let registry = ActionRegistry::new(Arc::new(Recorder::default()), ActionProfile::Touch).unwrap();
        let done = call("done", json!({"status": "completed", "reason": "x"}));
        assert!(registry.parse(&done).is_ok());
        assert!(matches!(registry.execute(&done).await, Err(PilotError::Executor(_))));
    }

    #[tokio::test]
    async fn invalid_input_does_not_reach_device() {
        let device = Arc::new(Recorder::default());
        let registry = ActionRegistry::new(device.clone(), ActionProfile::Touch).unwrap();
        let err = registry.execute(&call("tap", json!({"x": 1}))).await.unwrap_err();
        assert!(matches!(err, PilotError::InvalidToolInput { .. }));
        assert!(device.calls.lock().unwrap().is_empty());
    }
}
