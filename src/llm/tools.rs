use crate::config::ActionProfile;
use crate::errors::{PilotError, PilotResult};
use crate::llm::types::ToolDef;

const CURSOR_ACTIONS: &[&str] = &["move_cursor", "click_cursor", "done"];
const TOUCH_ACTIONS: &[&str] = &["tap", "long_press", "swipe", "input_text", "press_key", "done"];

/// Loads every declared action schema from prompts/tools/actions.json.
/// The JSON is embedded at compile time via include_str!.
pub fn load_action_tools() -> PilotResult<Vec<ToolDef>> {
    let json = include_str!("../../prompts/tools/actions.json");
    serde_json::from_str(json)
        .map_err(|e| PilotError::Config(format!("Failed to parse action tools: {e}")))
}

/// Action names offered to the reasoning service for a profile.
pub fn profile_action_names(profile: ActionProfile) -> Option<&'static [&'static str]> {
    match profile {
        ActionProfile::Cursor => Some(CURSOR_ACTIONS),
        ActionProfile::Touch => Some(TOUCH_ACTIONS),
        ActionProfile::Full => None,
    }
}

/// Schemas for the actions available under `profile`, in declaration order.
pub fn tools_for_profile(profile: ActionProfile) -> PilotResult<Vec<ToolDef>> {
    let all = load_action_tools()?;
    Ok(match profile_action_names(profile) {
        Some(names) => all
            .into_iter()
            .filter(|t| names.contains(&t.name.as_str()))
            .collect(),
        None => all,
    })
}

const CURSOR_PROMPT: &str = include_str!("../../prompts/system/cursor.txt");
const TOUCH_PROMPT: &str = include_str!("../../prompts/system/touch.txt");

/// Fixed system instruction sent with every request.
pub fn system_prompt(profile: ActionProfile, device_name: &str) -> String {
    let template = match profile {
        ActionProfile::Cursor => CURSOR_PROMPT,
        ActionProfile::Touch | ActionProfile::Full => TOUCH_PROMPT,
    };
    template.replace("{device_name}", device_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schemas_parse() {
        let tools = load_action_tools().unwrap();
        assert_eq!(tools.len(), 8);
        let done = tools.iter().find(|t| t.name == "done").unwrap();
        assert_eq!(
            done.input_schema["required"],
            serde_json::json!(["status", "reason"])
        );
    }

    #[test]
    fn profiles_filter_and_keep_done() {
        let cursor: Vec<_> = tools_for_profile(ActionProfile::Cursor)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(cursor, vec!["move_cursor", "click_cursor", "done"]);

        let touch = tools_for_profile(ActionProfile::Touch).unwrap();
        assert_eq!(touch.len(), 6);
        assert!(touch.iter().any(|t| t.name == "done"));
        assert!(!touch.iter().any(|t| t.name == "move_cursor"));
    }

    #[test]
    fn prompt_names_the_device() {
        let prompt = system_prompt(ActionProfile::Touch, "Pixel 7");
        assert!(prompt.contains("Pixel 7"));
        assert!(!prompt.contains("{device_name}"));
    }
}
