use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::{json, Value};

use crate::errors::{PilotError, PilotResult};
use crate::llm::types::{Role, Segment, Turn};

/// Write `turns` into a fresh `touchpilot_conversation_<timestamp>` folder under `dir`:
/// `conversation.json`, `conversation.html`, and one file per screenshot.
/// Returns the folder path.
pub fn export_conversation(turns: &[Turn], task: &str, dir: &Path) -> PilotResult<PathBuf> {
    if turns.is_empty() {
        return Err(PilotError::Export("there is no conversation to export".into()));
    }

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let folder = unique_folder(dir, &format!("touchpilot_conversation_{stamp}"));
    std::fs::create_dir_all(&folder)?;

    let mut json_turns = Vec::with_capacity(turns.len());
    let mut html = String::new();
    html_header(&mut html, task);

    for (t, turn) in turns.iter().enumerate() {
        let role = match turn.role {
            Role::Observer => "observer",
            Role::Reasoner => "reasoner",
        };
        let _ = writeln!(html, "<section class='turn {role}'>\n<h2>Turn {} &middot; {role}</h2>", t + 1);

        let mut json_segments = Vec::with_capacity(turn.segments.len());
        for (s, segment) in turn.segments.iter().enumerate() {
            match segment {
                Segment::Text { text } => {
                    let _ = writeln!(html, "<div class='log'>{}</div>", encode_text(text));
                    json_segments.push(json!({"type": "text", "text": text}));
                }
                Segment::Image { image } => {
                    let file = format!("screenshot_{t}_{s}.{}", image.file_extension());
                    std::fs::write(folder.join(&file), &image.data)?;
                    let _ = writeln!(
                        html,
                        "<img src=\"{}\" alt=\"Screenshot {}\" class='screenshot'>",
                        encode_double_quoted_attribute(&file),
                        t + 1
                    );
                    json_segments.push(json!({"type": "image", "file": file}));
                }
                Segment::ToolCall(tc) => {
                    let _ = writeln!(
                        html,
                        "<div class='tool-call'><strong>Tool Call:</strong><br>Tool: {}<br>Input: {}</div>",
                        encode_text(&tc.name),
                        encode_text(&tc.input.to_string())
                    );
                    json_segments.push(json!({
                        "type": "tool_call",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.input,
                    }));
                }
                Segment::ToolResult { tool_call_id, content, is_error } => {
                    let _ = writeln!(
                        html,
                        "<div class='tool-result'><strong>Tool Result:</strong><br>{}</div>",
                        encode_text(content)
                    );
                    json_segments.push(json!({
                        "type": "tool_result",
                        "tool_call_id": tool_call_id,
                        "content": content,
                        "is_error": is_error,
                    }));
                }
            }
        }
        html.push_str("</section>\n");
        json_turns.push(json!({"role": turn.role.as_wire(), "segments": json_segments}));
    }
    html.push_str("</body>\n</html>\n");

    let document: Value = json!({
        "task": task,
        "exported_at": chrono::Local::now().to_rfc3339(),
        "turns": json_turns,
    });
    std::fs::write(
        folder.join("conversation.json"),
        serde_json::to_string_pretty(&document)?,
    )?;
    std::fs::write(folder.join("conversation.html"), html)?;

    tracing::info!(path = %folder.display(), turns = turns.len(), "conversation exported");
    Ok(folder)
}

/// Two exports in the same second get `_2`, `_3`, … suffixes.
fn unique_folder(dir: &Path, base: &str) -> PathBuf {
    let mut candidate = dir.join(base);
    let mut n = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{base}_{n}"));
        n += 1;
    }
    candidate
}

fn html_header(html: &mut String, task: &str) {
    let _ = write!(
        html,
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
<title>TouchPilot Conversation</title>
<style>
body {{ font-family: Arial, sans-serif; line-height: 1.6; padding: 20px; }}
h1 {{ color: #333; }}
.log {{ background-color: #f4f4f4; padding: 10px; margin-bottom: 10px; white-space: pre-wrap; }}
.screenshot {{ max-width: 100%; height: auto; margin-bottom: 10px; }}
.tool-call, .tool-result {{ background-color: #e6f3ff; padding: 10px; margin-bottom: 10px; }}
</style>
</head>
<body>
<h1>TouchPilot Conversation</h1>
<p><strong>Task:</strong> {}</p>
",
        encode_text(task)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{EncodedImage, ToolCall};

    fn sample() -> Vec<Turn> {
        vec![
            Turn::observer(vec![
                Segment::text("Task: find <b>settings</b>"),
                Segment::Image { image: EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]) },
            ]),
            Turn::reasoner(vec![
                Segment::text("Tapping the gear icon."),
                Segment::ToolCall(ToolCall {
                    id: "toolu_1".into(),
                    name: "tap".into(),
                    input: json!({"x": 120, "y": 340}),
                }),
            ]),
            Turn::observer(vec![Segment::tool_result("toolu_1", "Tapped at (120, 340).")]),
        ]
    }

    #[test]
    fn writes_json_html_and_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let folder = export_conversation(&sample(), "open settings", dir.path()).unwrap();

        let name = folder.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("touchpilot_conversation_"));

        let shot = std::fs::read(folder.join("screenshot_0_1.jpg")).unwrap();
        assert_eq!(shot, vec![0xFF, 0xD8, 0xFF, 0xD9]);

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(folder.join("conversation.json")).unwrap()).unwrap();
        assert_eq!(doc["task"], "open settings");
        assert_eq!(doc["turns"].as_array().unwrap().len(), 3);
        assert_eq!(doc["turns"][0]["role"], "user");
        assert_eq!(doc["turns"][0]["segments"][1]["file"], "screenshot_0_1.jpg");
        assert_eq!(doc["turns"][1]["segments"][1]["name"], "tap");
        assert_eq!(doc["turns"][2]["segments"][0]["content"], "Tapped at (120, 340).");

        let html = std::fs::read_to_string(folder.join("conversation.html")).unwrap();
        assert!(html.contains("&lt;b&gt;settings&lt;/b&gt;"));
        assert!(html.contains("src=\"screenshot_0_1.jpg\""));
        assert!(html.contains("Tapped at (120, 340)."));
    }

    #[test]
    fn repeated_exports_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = export_conversation(&sample(), "t", dir.path()).unwrap();
        let b = export_conversation(&sample(), "t", dir.path()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            export_conversation(&[], "t", dir.path()),
            Err(PilotError::Export(_))
        ));
    }
}
