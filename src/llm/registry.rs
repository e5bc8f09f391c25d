use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ProviderEntry, SessionConfig};
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::ReasoningClient;
use crate::llm::providers::anthropic::AnthropicProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::retry::RetryingClient;
use crate::llm::types::CallConfig;

/// Registry of all configured reasoning providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ReasoningClient>>,
    entries: HashMap<String, ProviderEntry>,
    active: String,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            entries: HashMap::new(),
            active,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn ReasoningClient>, entry: ProviderEntry) {
        let name = provider.name().to_string();
        self.entries.insert(name.clone(), entry);
        self.providers.insert(name, provider);
    }

    pub fn set_active(&mut self, name: String) -> PilotResult<()> {
        if self.providers.contains_key(&name) {
            self.active = name;
            Ok(())
        } else {
            Err(PilotError::Config(format!(
                "Provider '{name}' not registered (available: {})",
                self.list_names().join(", ")
            )))
        }
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The active client together with its sampling parameters.
    pub fn active(&self) -> PilotResult<(Arc<dyn ReasoningClient>, CallConfig)> {
        let provider = self.providers.get(&self.active).cloned().ok_or_else(|| {
            PilotError::Config(format!("Active provider '{}' not found in registry", self.active))
        })?;
        let entry = &self.entries[&self.active];
        tracing::debug!(
            provider = %self.active,
            model = %entry.model,
            max_tokens = entry.max_tokens,
            temperature = entry.temperature,
            "resolved active provider"
        );
        Ok((
            provider,
            CallConfig {
                model: entry.model.clone(),
                max_tokens: entry.max_tokens,
                temperature: entry.temperature,
                stream: entry.stream,
            },
        ))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `TOUCHPILOT_<ID>_API_KEY`,
    /// falling back to the key stored in the config file.
    pub fn from_config(config: &AppConfig) -> PilotResult<Self> {
        let mut registry = Self::new(config.llm.active_provider.clone());
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("TOUCHPILOT_{}_API_KEY", id.to_uppercase()))
                .ok()
                .or_else(|| entry.api_key.clone())
                .unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key configured");
            }
            let base: Arc<dyn ReasoningClient> = match entry.adapter.as_deref() {
                Some("anthropic") => Arc::new(AnthropicProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                )?),
                None | Some("openai") => Arc::new(OpenAiCompatibleProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                )?),
                Some(other) => {
                    return Err(PilotError::Config(format!(
                        "provider '{id}' uses unknown adapter '{other}'"
                    )))
                }
            };
            registry.register(with_retry(base, &config.session), entry.clone());
        }
        Ok(registry)
    }
}

fn with_retry(client: Arc<dyn ReasoningClient>, session: &SessionConfig) -> Arc<dyn ReasoningClient> {
    if session.max_retries == 0 {
        return client;
    }
    Arc::new(RetryingClient::new(
        client,
        session.max_retries,
        Duration::from_millis(session.initial_backoff_ms),
    ))
}
