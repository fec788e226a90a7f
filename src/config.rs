use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{SandpilotError, SandpilotResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (falls back to env var SANDPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps agent roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Vision model: screen assessment from a screenshot plus history.
    pub vision: Option<RoleEntry>,
    /// Tool-calling model: turns the assessment into structured tool calls.
    pub action: Option<RoleEntry>,
    /// Grounding model: natural-language UI target to pixel coordinates.
    pub grounding: Option<RoleEntry>,
    /// Planner model used by the orchestrator for multi-step plans.
    pub planner: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Bounded wait for synchronous shell commands inside the sandbox.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Session keep-alive extension requested at the top of every loop iteration.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
    /// Settle delay between orchestrator plan steps.
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,
    /// Attempt a best-effort Chrome install at run start.
    #[serde(default = "default_true")]
    pub bootstrap_browser: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            keepalive_secs: default_keepalive(),
            step_delay_ms: default_step_delay(),
            bootstrap_browser: default_true(),
        }
    }
}

fn default_command_timeout() -> u64 {
    5
}

fn default_keepalive() -> u64 {
    60
}

fn default_step_delay() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for the run log. Defaults to the current working directory.
    pub dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub save_log: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            save_log: true,
        }
    }
}

fn resolve_config_path() -> SandpilotResult<PathBuf> {
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

    Err(SandpilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> SandpilotResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> SandpilotResult<()> {
    let path = resolve_config_path()?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
