use anyhow::{bail, Context, Result};
use hearth_runtime::{EngineConfig, ToolFailurePolicy, DEFAULT_PROMPT_SYSTEM};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const LLM_API_KEY_ENV: &str = "HEARTH_LLM_API_KEY";
const HASS_TOKEN_ENV: &str = "HASS_TOKEN";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    /// Empty means "read HEARTH_LLM_API_KEY"
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub model: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HomeAssistantConfig {
    #[serde(default = "default_hass_url")]
    pub url: String,

    /// Long-lived access token; empty means "read HASS_TOKEN"
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_location_name")]
    pub location_name: String,

    /// Domains surfaced in the prompt; empty exposes everything
    #[serde(default)]
    pub expose_domains: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConversationConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub on_tool_failure: ToolFailurePolicy,

    /// Inline system prompt template; empty uses the built-in one
    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub prompt_file: Option<String>,

    /// Render the prompt through Home Assistant's template endpoint
    #[serde(default)]
    pub remote_templates: bool,

    #[serde(default)]
    pub current_user: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_llm_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.8
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    128
}

fn default_hass_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_location_name() -> String {
    "Home".to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: String::new(),
            model: String::new(),
            timeout_secs: default_timeout(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            url: default_hass_url(),
            token: String::new(),
            location_name: default_location_name(),
            expose_domains: Vec::new(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            on_tool_failure: ToolFailurePolicy::default(),
            prompt: String::new(),
            prompt_file: None,
            remote_templates: false,
            current_user: String::new(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Config value, falling back to an environment variable when empty
fn or_env(value: &str, var: &str) -> Option<String> {
    if value.is_empty() {
        std::env::var(var).ok().filter(|v| !v.is_empty())
    } else {
        Some(value.to_string())
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<String> {
        or_env(&self.api_key, LLM_API_KEY_ENV)
    }
}

impl HomeAssistantConfig {
    pub fn token(&self) -> Result<String> {
        or_env(&self.token, HASS_TOKEN_ENV).with_context(|| {
            format!(
                "No Home Assistant token configured. Set [home_assistant].token or {}",
                HASS_TOKEN_ENV
            )
        })
    }
}

impl Config {
    /// System prompt template: prompt_file, then inline prompt, then the built-in default
    pub fn prompt_template(&self) -> Result<String> {
        if let Some(file) = &self.conversation.prompt_file {
            let path = shellexpand::tilde(file).to_string();
            return fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path));
        }
        if !self.conversation.prompt.trim().is_empty() {
            return Ok(self.conversation.prompt.clone());
        }
        Ok(DEFAULT_PROMPT_SYSTEM.to_string())
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        if self.conversation.max_iterations == 0 {
            bail!("[conversation].max_iterations must be at least 1");
        }
        Ok(EngineConfig {
            ha_name: self.home_assistant.location_name.clone(),
            prompt: self.prompt_template()?,
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            top_p: self.llm.top_p,
            max_iterations: self.conversation.max_iterations,
            on_tool_failure: self.conversation.on_tool_failure,
        })
    }
}

/// Load config from file or use defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .context(format!("Failed to read config file: {:?}", path))?;
            let config: Config = toml::from_str(&content).context("Failed to parse TOML config")?;
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}
