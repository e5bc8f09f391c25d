use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PilotError, PilotResult};
use crate::llm::types::ToolCall;
use crate::perception::types::Point;

pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;
pub const DEFAULT_SWIPE_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Screen-space offset for a move of `distance` pixels (y grows downwards).
    pub fn offset(&self, distance: u32) -> (i32, i32) {
        let d = distance.min(i32::MAX as u32) as i32;
        match self {
            Direction::Up => (0, -d),
            Direction::Down => (0, d),
            Direction::Left => (-d, 0),
            Direction::Right => (d, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemKey {
    Home,
    Back,
    Menu,
    Power,
    VolumeUp,
    VolumeDown,
    Enter,
    Delete,
}

impl SystemKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemKey::Home => "home",
            SystemKey::Back => "back",
            SystemKey::Menu => "menu",
            SystemKey::Power => "power",
            SystemKey::VolumeUp => "volume_up",
            SystemKey::VolumeDown => "volume_down",
            SystemKey::Enter => "enter",
            SystemKey::Delete => "delete",
        }
    }

    pub fn android_keycode(&self) -> &'static str {
        match self {
            SystemKey::Home => "KEYCODE_HOME",
            SystemKey::Back => "KEYCODE_BACK",
            SystemKey::Menu => "KEYCODE_MENU",
            SystemKey::Power => "KEYCODE_POWER",
            SystemKey::VolumeUp => "KEYCODE_VOLUME_UP",
            SystemKey::VolumeDown => "KEYCODE_VOLUME_DOWN",
            SystemKey::Enter => "KEYCODE_ENTER",
            SystemKey::Delete => "KEYCODE_DEL",
        }
    }
}

/// Final verdict carried by a `done` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneStatus {
    Completed,
    Failed,
}

/// A validated tool call. Every variant maps to exactly one device primitive,
/// except `Done`, which the controller intercepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeviceAction {
    MoveCursor { direction: Direction, distance: u32 },
    ClickCursor,
    Tap { at: Point },
    LongPress { at: Point, duration_ms: u64 },
    Swipe { from: Point, to: Point, duration_ms: u64 },
    InputText { at: Point, text: String },
    PressKey { key: SystemKey },
    Done { status: DoneStatus, reason: String },
}

impl DeviceAction {
    /// Wire name of the action, as declared in the tool schemas.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceAction::MoveCursor { .. } => "move_cursor",
            DeviceAction::ClickCursor => "click_cursor",
            DeviceAction::Tap { .. } => "tap",
            DeviceAction::LongPress { .. } => "long_press",
            DeviceAction::Swipe { .. } => "swipe",
            DeviceAction::InputText { .. } => "input_text",
            DeviceAction::PressKey { .. } => "press_key",
            DeviceAction::Done { .. } => "done",
        }
    }

    /// Validate a raw tool call. Unknown names fail with `UnknownTool`,
    /// missing or mistyped fields with `InvalidToolInput`.
    pub fn parse(call: &ToolCall) -> PilotResult<Self> {
        let tool = call.name.as_str();
        let empty = Map::new();
        let input = match &call.input {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(PilotError::invalid_input(
                    tool,
                    format!("expected a JSON object, got {other}"),
                ))
            }
        };
        let args = Args { tool, input };

        Ok(match tool {
            "move_cursor" => DeviceAction::MoveCursor {
                direction: args.enumerated("direction")?,
                distance: args.non_negative("distance")?,
            },
            "click_cursor" => DeviceAction::ClickCursor,
            "tap" => DeviceAction::Tap { at: args.point("x", "y")? },
            "long_press" => DeviceAction::LongPress {
                at: args.point("x", "y")?,
                duration_ms: args.duration("duration", DEFAULT_LONG_PRESS_MS)?,
            },
            "swipe" => DeviceAction::Swipe {
                from: args.point("start_x", "start_y")?,
                to: args.point("end_x", "end_y")?,
                duration_ms: args.duration("duration", DEFAULT_SWIPE_MS)?,
            },
            "input_text" => DeviceAction::InputText {
                at: args.point("x", "y")?,
                text: args.string("text")?,
            },
            "press_key" => DeviceAction::PressKey { key: args.enumerated("key")? },
            "done" => DeviceAction::Done {
                status: args.enumerated("status")?,
                reason: args.string("reason")?,
            },
            other => return Err(PilotError::UnknownTool(other.to_string())),
        })
    }
}

struct Args<'a> {
    tool: &'a str,
    input: &'a Map<String, Value>,
}

impl Args<'_> {
    fn field(&self, name: &str) -> PilotResult<&Value> {
        self.input
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| PilotError::invalid_input(self.tool, format!("missing field '{name}'")))
    }

    fn integer(&self, name: &str) -> PilotResult<i64> {
        let value = self.field(name)?;
        value.as_i64().ok_or_else(|| {
            PilotError::invalid_input(self.tool, format!("'{name}' must be an integer, got {value}"))
        })
    }

    fn coordinate(&self, name: &str) -> PilotResult<i32> {
        let raw = self.integer(name)?;
        i32::try_from(raw).map_err(|_| {
            PilotError::invalid_input(self.tool, format!("'{name}' is out of range: {raw}"))
        })
    }

    fn point(&self, x: &str, y: &str) -> PilotResult<Point> {
        Ok(Point::new(self.coordinate(x)?, self.coordinate(y)?))
    }

    fn non_negative(&self, name: &str) -> PilotResult<u32> {
        let raw = self.integer(name)?;
        u32::try_from(raw).map_err(|_| {
            PilotError::invalid_input(self.tool, format!("'{name}' must be a non-negative integer, got {raw}"))
        })
    }

    fn duration(&self, name: &str, default: u64) -> PilotResult<u64> {
        match self.input.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.non_negative(name).map(u64::from),
        }
    }

    fn string(&self, name: &str) -> PilotResult<String> {
        let value = self.field(name)?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            PilotError::invalid_input(self.tool, format!("'{name}' must be a string, got {value}"))
        })
    }

    fn enumerated<T: serde::de::DeserializeOwned>(&self, name: &str) -> PilotResult<T> {
        let value = self.field(name)?;
        serde_json::from_value(value.clone()).map_err(|_| {
            PilotError::invalid_input(self.tool, format!("'{name}' has unsupported value {value}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "toolu_1".into(),
            name: name.into(),
            input,
        }
    }

    #[test]
    fn parses_move_cursor() {
        let action = DeviceAction::parse(&call("move_cursor", json!({"direction": "left", "distance": 40}))).unwrap();
        assert_eq!(
            action,
            DeviceAction::MoveCursor { direction: Direction::Left, distance: 40 }
        );
        assert_eq!(Direction::Left.offset(40), (-40, 0));
        assert_eq!(Direction::Up.offset(5), (0, -5));
    }

    #[test]
    fn click_cursor_accepts_missing_input() {
        assert_eq!(
            DeviceAction::parse(&call("click_cursor", Value::Null)).unwrap(),
            DeviceAction::ClickCursor
        );
    }

    #[test]
    fn optional_durations_fall_back_to_defaults() {
        let lp = DeviceAction::parse(&call("long_press", json!({"x": 1, "y": 2}))).unwrap();
        assert_eq!(lp, DeviceAction::LongPress { at: Point::new(1, 2), duration_ms: 1000 });

        let sw = DeviceAction::parse(&call(
            "swipe",
            json!({"start_x": 0, "start_y": 800, "end_x": 0, "end_y": 200, "duration": 500}),
        ))
        .unwrap();
        assert_eq!(
            sw,
            DeviceAction::Swipe { from: Point::new(0, 800), to: Point::new(0, 200), duration_ms: 500 }
        );
    }

    #[test]
    fn done_parses_status_and_reason() {
        let action = DeviceAction::parse(&call("done", json!({"status": "completed", "reason": "ok"}))).unwrap();
        assert_eq!(action, DeviceAction::Done { status: DoneStatus::Completed, reason: "ok".into() });
        assert_eq!(action.name(), "done");
    }

    #[test]
    fn rejects_bad_inputs() {
        let cases = [
            call("move_cursor", json!({"direction": "sideways", "distance": 3})),
            call("move_cursor", json!({"direction": "up", "distance": -3})),
            call("move_cursor", json!({"direction": "up"})),
            call("tap", json!({"x": "120", "y": 4})),
            call("tap", json!({"x": 1.5, "y": 4})),
            call("press_key", json!({"key": "escape"})),
            call("done", json!({"status": "maybe", "reason": "?"})),
            call("input_text", json!({"x": 1, "y": 1})),
            call("tap", json!([1, 2])),
        ];
        for c in &cases {
            match DeviceAction::parse(c) {
                Err(PilotError::InvalidToolInput { tool, .. }) => assert_eq!(tool, c.name),
                other => panic!("{} {}: expected InvalidToolInput, got {other:?}", c.name, c.input),
            }
        }
    }

    #[test]
    fn unknown_name_is_distinct() {
        assert!(matches!(
            DeviceAction::parse(&call("teleport", json!({}))),
            Err(PilotError::UnknownTool(name)) if name == "teleport"
        ));
    }
}
