use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{SandpilotError, SandpilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    /// Kept for role-to-model lookups (does not need to be mutable after init).
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
            llm_config: LlmConfig::default(),
        }
    }

    pub fn with_config(llm_config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            active: llm_config.active_provider.clone(),
            llm_config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Register under an explicit key (used when the provider id and the
    /// config key differ, e.g. stub collaborators in tests).
    pub fn register_named(&mut self, name: &str, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    pub fn get_active(&self) -> SandpilotResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            SandpilotError::Config(format!(
                "Active provider '{}' not found in registry",
                self.active
            ))
        })
    }

    pub fn list_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Return the provider and call configuration for a named agent role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature
    pub fn call_config_for_role(
        &self,
        role: &str,
    ) -> SandpilotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            "vision" => self.llm_config.roles.vision.as_ref(),
            "action" => self.llm_config.roles.action.as_ref(),
            "grounding" => self.llm_config.roles.grounding.as_ref(),
            "planner" => self.llm_config.roles.planner.as_ref(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to active provider");
                None
            }
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                SandpilotError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.1)
            });
            tracing::debug!(
                role = role,
                provider = %entry.provider,
                model = %entry.model,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    temperature,
                },
            ));
        }

        // Fallback: active provider, provider-level defaults
        let provider = self.get_active()?;
        let entry = self.llm_config.providers.get(&self.active);
        let (model, temperature) = entry
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        tracing::debug!(
            role = role,
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((provider, CallConfig { model, temperature }))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `SANDPILOT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("SANDPILOT_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            let provider =
                OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key);
            registry.register(Arc::new(provider));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderEntry, RoleEntry, RolesConfig};
    use crate::llm::testing::ScriptedProvider;
    use std::collections::HashMap;

    fn sample_config() -> LlmConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "local".to_string(),
            ProviderEntry {
                display_name: "Local".into(),
                api_base: "http://localhost/v1".into(),
                model: "base-model".into(),
                temperature: 0.4,
                api_key: None,
            },
        );
        LlmConfig {
            active_provider: "local".into(),
            providers,
            roles: RolesConfig {
                grounding: Some(RoleEntry {
                    provider: "local".into(),
                    model: "grounder".into(),
                    temperature: None,
                }),
                ..Default::default()
            },
        }
    }

    #[test]
    fn role_entry_wins_over_active_provider() {
        let mut registry = ProviderRegistry::with_config(sample_config());
        registry.register_named("local", std::sync::Arc::new(ScriptedProvider::text_only("local", "")));

        let (_, cfg) = registry.call_config_for_role("grounding").unwrap();
        assert_eq!(cfg.model, "grounder");
        // Provider-level temperature fills in when the role leaves it unset.
        assert_eq!(cfg.temperature, 0.4);
    }

    #[test]
    fn unconfigured_role_falls_back_to_active() {
        let mut registry = ProviderRegistry::with_config(sample_config());
        registry.register_named("local", std::sync::Arc::new(ScriptedProvider::text_only("local", "")));

        let (_, cfg) = registry.call_config_for_role("vision").unwrap();
        assert_eq!(cfg.model, "base-model");
    }

    #[test]
    fn missing_provider_is_a_config_error() {
        let registry = ProviderRegistry::with_config(sample_config());
        assert!(registry.call_config_for_role("grounding").is_err());
    }
}
