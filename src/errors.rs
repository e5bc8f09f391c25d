use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Screenshot capture error: {0}")]
    Capture(String),

    #[error("Remote reasoning service error: {0}")]
    Transport(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input for {tool}: {message}")]
    InvalidToolInput { tool: String, message: String },

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("conversation exceeded maximum length of {max_turns} turns")]
    ConversationOverflow { max_turns: usize },

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PilotError {
    pub fn invalid_input(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidToolInput {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// Whether the remote service call that produced this error may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            PilotError::Http(e) => e.is_timeout() || e.is_connect(),
            PilotError::Transport(msg) => {
                msg.starts_with("429") || msg.starts_with('5')
            }
            _ => false,
        }
    }
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
