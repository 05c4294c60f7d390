//! Configuration — loaded from `wyrm.toml`, overridable programmatically,
//! with environment fallback for API keys.

use std::path::Path;

use serde::{Deserialize, Serialize};

use wyrm_llm::{ModelConfig, ProviderKind};

use crate::error::SessionError;

/// Dashboard port used when `visible` is set without an explicit port.
pub const DEFAULT_DASHBOARD_PORT: u16 = 8546;

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider name: `anthropic`, `openai`, or `ollama`.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// API key; falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum output tokens.
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            model: "claude-sonnet-4-20250514".into(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether the content-addressed cache is active.
    pub enabled: bool,
    /// Cache directory.
    pub directory: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: ".wyrm/cache".into(),
        }
    }
}

/// Self-healing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingSettings {
    /// Whether healing is active.
    pub enabled: bool,
    /// Maximum retry attempts.
    pub max_retries: u32,
}

impl Default for HealingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum steps per run.
    pub max_steps: u32,
    /// Wall-clock timeout in seconds.
    pub timeout: f64,
    /// Default strategy name.
    pub strategy: String,
    /// Agentic backend (`claude-code`, `codex`); unset = local tool loop.
    pub agentic_provider: Option<String>,
    /// Model override for the agentic backend.
    pub agentic_model: Option<String>,
    /// API key for the agentic backend.
    pub agentic_api_key: Option<String>,
    /// Path to the agent CLI binary.
    pub agentic_cli_path: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 50,
            timeout: 300.0,
            strategy: "depth-first".into(),
            agentic_provider: None,
            agentic_model: None,
            agentic_api_key: None,
            agentic_cli_path: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WyrmConfig {
    /// Provider settings.
    pub llm: LlmSettings,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Self-healing settings.
    pub healing: HealingSettings,
    /// Agent settings.
    pub agent: AgentSettings,
    /// Enable debug-level logging in the host application.
    pub verbose: bool,
    /// Enable `act` self-healing.
    pub self_heal: bool,
    /// Serve the execution dashboard.
    pub visible: bool,
    /// Dashboard port; defaulted when `visible` is set.
    pub dashboard_port: Option<u16>,
}

impl WyrmConfig {
    /// Apply invariants: `visible` implies a dashboard port, and API keys
    /// fall back to the environment.
    pub fn normalize(mut self) -> Self {
        if self.visible && self.dashboard_port.is_none() {
            self.dashboard_port = Some(DEFAULT_DASHBOARD_PORT);
        }
        if self.llm.api_key.is_none() {
            let env_var = match self.llm.provider.as_str() {
                "anthropic" => Some("ANTHROPIC_API_KEY"),
                "openai" => Some("OPENAI_API_KEY"),
                _ => None,
            };
            if let Some(env_var) = env_var {
                self.llm.api_key = std::env::var(env_var).ok();
            }
        }
        self
    }

    /// Resolve the provider settings into a [`ModelConfig`].
    pub fn model_config(&self) -> Result<ModelConfig, SessionError> {
        let provider = match self.llm.provider.as_str() {
            "anthropic" => ProviderKind::Anthropic,
            "openai" => ProviderKind::OpenAi,
            "ollama" => ProviderKind::Ollama,
            other => {
                return Err(SessionError::Config(format!(
                    "unknown llm provider '{other}' (expected anthropic, openai, or ollama)"
                )));
            }
        };
        Ok(ModelConfig {
            provider,
            model: self.llm.model.clone(),
            api_key: self.llm.api_key.clone(),
            base_url: self.llm.base_url.clone(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        })
    }
}

/// Load configuration from a `wyrm.toml` file, falling back to defaults
/// when the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<WyrmConfig, SessionError> {
    let path = path.unwrap_or_else(|| Path::new("wyrm.toml"));
    if !path.exists() {
        return Ok(WyrmConfig::default().normalize());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SessionError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config: WyrmConfig = toml::from_str(&raw)
        .map_err(|e| SessionError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(config.normalize())
}

impl Default for WyrmConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            cache: CacheSettings::default(),
            healing: HealingSettings::default(),
            agent: AgentSettings::default(),
            verbose: false,
            self_heal: true,
            visible: false,
            dashboard_port: None,
        }
    }
}
