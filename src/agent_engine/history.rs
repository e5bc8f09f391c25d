use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::PilotResult;
use crate::llm::types::{Role, Segment, Turn};

/// One JSONL line per stored turn. Images are reduced to their byte counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub index: usize,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<usize>,
}

impl HistoryEntry {
    pub fn from_turn(index: usize, turn: &Turn) -> Self {
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();
        let mut images = Vec::new();
        for segment in &turn.segments {
            match segment {
                Segment::ToolCall(tc) => tool_calls.push(serde_json::json!({
                    "id": tc.id,
                    "name": tc.name,
                    "input": tc.input,
                })),
                Segment::ToolResult { tool_call_id, content, .. } => {
                    tool_results.push(serde_json::json!({
                        "tool_call_id": tool_call_id,
                        "content": content,
                    }))
                }
                Segment::Image { image } => images.push(image.len()),
                Segment::Text { .. } => {}
            }
        }
        let text = turn.text();
        Self {
            ts: chrono::Utc::now().timestamp_millis(),
            index,
            role: turn.role,
            content: (!text.is_empty()).then_some(text),
            tool_calls,
            tool_results,
            images,
        }
    }
}

/// Per-session audit log written as `session_<uuid>.jsonl`.
pub struct SessionHistory {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionHistory {
    pub fn new(dir: &Path) -> PilotResult<Self> {
        std::fs::create_dir_all(dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        tracing::debug!(path = %file_path.display(), "session history opened");
        Ok(Self {
            session_id,
            file_path,
        })
    }

    /// Open a log in `dir`, or in the platform data directory when `dir` is None.
    pub fn in_dir_or_default(dir: Option<&Path>) -> PilotResult<Self> {
        match dir {
            Some(d) => Self::new(d),
            None => Self::new(&default_dir()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append one entry to the JSONL file.
    pub fn append(&self, entry: &HistoryEntry) -> PilotResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Record a stored turn. Failures are logged and otherwise ignored.
    pub fn record(&self, index: usize, turn: &Turn) {
        if let Err(e) = self.append(&HistoryEntry::from_turn(index, turn)) {
            tracing::warn!(path = %self.file_path.display(), error = %e, "history write failed");
        }
    }
}

/// `<data_local_dir>/touchpilot/sessions`, falling back to `./sessions`.
fn default_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("touchpilot").join("sessions"))
        .unwrap_or_else(|| PathBuf::from("sessions"))
}
