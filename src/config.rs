use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TURNS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderEntry {
                display_name: "Anthropic".into(),
                api_base: "https://api.anthropic.com".into(),
                model: DEFAULT_MODEL.into(),
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
                adapter: Some("anthropic".into()),
                api_key: None,
                stream: false,
            },
        );
        Self {
            active_provider: "anthropic".into(),
            providers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// "anthropic" for the Messages API, None for OpenAI-compatible
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (falls back to env var TOUCHPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Use SSE streaming (OpenAI-compatible adapter only).
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hard ceiling on stored conversation turns.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// Extra attempts for transient remote-service failures. 0 disables retrying.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Directory for per-session JSONL audit logs. None uses the platform data dir.
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            iteration_delay_ms: default_iteration_delay_ms(),
            pause_poll_ms: default_pause_poll_ms(),
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            history_dir: None,
            export_dir: None,
        }
    }
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_iteration_delay_ms() -> u64 {
    1000
}

fn default_pause_poll_ms() -> u64 {
    100
}

fn default_initial_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[cfg_attr(feature = "desktop", default)]
    Desktop,
    Window,
    /// Default when built without the `desktop` feature.
    #[cfg_attr(not(feature = "desktop"), default)]
    Adb,
}

impl std::str::FromStr for BackendKind {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "window" => Ok(Self::Window),
            "adb" => Ok(Self::Adb),
            other => Err(PilotError::Config(format!("unknown device backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionProfile {
    /// Relative cursor moves and clicks.
    Cursor,
    /// Absolute touch gestures, text entry and system keys.
    Touch,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Overrides the backend's default action profile.
    #[serde(default)]
    pub profile: Option<ActionProfile>,
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default)]
    pub adb_serial: Option<String>,
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl DeviceConfig {
    pub fn effective_profile(&self) -> ActionProfile {
        self.profile.unwrap_or(match self.backend {
            BackendKind::Desktop | BackendKind::Window => ActionProfile::Cursor,
            BackendKind::Adb => ActionProfile::Touch,
        })
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            profile: None,
            window_title: default_window_title(),
            adb_serial: None,
            adb_path: default_adb_path(),
            device_name: None,
            jpeg_quality: default_jpeg_quality(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_window_title() -> String {
    "iPhone Mirroring".into()
}

fn default_adb_path() -> String {
    "adb".into()
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

impl AppConfig {
    pub fn validate(&self) -> PilotResult<()> {
        if self.session.max_turns == 0 {
            return Err(PilotError::Config("session.max_turns must be at least 1".into()));
        }
        if !(1..=100).contains(&self.device.jpeg_quality) {
            return Err(PilotError::Config(format!(
                "device.jpeg_quality must be within 1..=100, got {}",
                self.device.jpeg_quality
            )));
        }
        if !self.llm.providers.contains_key(&self.llm.active_provider) {
            return Err(PilotError::Config(format!(
                "active provider '{}' has no [llm.providers.{}] entry",
                self.llm.active_provider, self.llm.active_provider
            )));
        }
        Ok(())
    }
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> PilotResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> PilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
