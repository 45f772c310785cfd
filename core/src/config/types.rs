//! Configuration types for Switchboard core
//!
//! Core only accepts fully resolved data. File discovery, loading and flag
//! overrides happen in the CLI layer.

use crate::error::ConfigError;
use crate::orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Wire protocol spoken by a provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Anthropic Messages API (Claude)
    #[serde(rename = "anthropic")]
    Anthropic,
    /// OpenAI-compatible chat completions (DeepSeek, Qwen/DashScope, OpenAI, local servers)
    #[serde(rename = "openai_compat")]
    OpenAICompat,
}

impl Protocol {
    /// Get the protocol name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Anthropic => "anthropic",
            Protocol::OpenAICompat => "openai_compat",
        }
    }

    /// Get the default base URL for this protocol
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Protocol::Anthropic => "https://api.anthropic.com",
            Protocol::OpenAICompat => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-name convention a provider expects for tool parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentCase {
    /// `file_name` (the internal convention)
    #[default]
    Snake,
    /// `fileName`
    Camel,
}

/// Model parameters for provider requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Top-p sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

/// Everything needed to construct one provider client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider id used for selection (e.g. "claude", "deepseek", "qwen")
    pub id: String,
    /// The protocol to use
    pub protocol: Protocol,
    /// Base URL for the API; the protocol default is used when absent
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key, either literal or `env:VAR_NAME`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Default model name
    pub model: String,
    /// Additional models this provider serves
    #[serde(default)]
    pub models: Vec<String>,
    /// Model parameters
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers for requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Parameter naming convention on the wire
    #[serde(default)]
    pub argument_case: ArgumentCase,
    /// Run a connectivity probe before the client is handed out
    #[serde(default = "default_probe_on_init")]
    pub probe_on_init: bool,
    /// Environment variables consulted, in order, when `api_key` is unset
    #[serde(default)]
    pub credential_env: Vec<String>,
}

fn default_probe_on_init() -> bool {
    true
}

impl ProviderSettings {
    /// Create settings for a provider with no credential configured
    pub fn new<S: Into<String>>(id: S, protocol: Protocol, model: S) -> Self {
        Self {
            id: id.into(),
            protocol,
            base_url: None,
            api_key: None,
            model: model.into(),
            models: Vec::new(),
            params: ModelParams::default(),
            headers: HashMap::new(),
            argument_case: ArgumentCase::Snake,
            probe_on_init: true,
            credential_env: Vec::new(),
        }
    }

    /// Defaults for the providers Switchboard knows out of the box
    pub fn builtin(id: &str) -> Option<Self> {
        let settings = match id {
            "claude" => Self {
                base_url: Some("https://api.anthropic.com".to_string()),
                models: vec!["claude-3-5-haiku-20241022".to_string()],
                credential_env: vec![
                    "ANTHROPIC_API_KEY".to_string(),
                    "CLAUDE_API_KEY".to_string(),
                ],
                ..Self::new("claude", Protocol::Anthropic, "claude-3-5-sonnet-20241022")
            },
            "deepseek" => Self {
                base_url: Some("https://api.deepseek.com/v1".to_string()),
                models: vec!["deepseek-reasoner".to_string()],
                credential_env: vec!["DEEPSEEK_API_KEY".to_string()],
                ..Self::new("deepseek", Protocol::OpenAICompat, "deepseek-chat")
            },
            "qwen" => Self {
                base_url: Some(
                    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
                ),
                models: vec!["qwen-max".to_string(), "qwen-turbo".to_string()],
                credential_env: vec![
                    "DASHSCOPE_API_KEY".to_string(),
                    "QWEN_API_KEY".to_string(),
                ],
                ..Self::new("qwen", Protocol::OpenAICompat, "qwen-plus")
            },
            _ => return None,
        };
        Some(settings)
    }

    /// All built-in provider defaults
    pub fn builtin_catalog() -> Vec<Self> {
        ["claude", "deepseek", "qwen"]
            .iter()
            .filter_map(|id| Self::builtin(id))
            .collect()
    }

    /// Set the API key
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the wire argument convention
    pub fn with_argument_case(mut self, argument_case: ArgumentCase) -> Self {
        self.argument_case = argument_case;
        self
    }

    /// Resolve the credential: literal key, `env:VAR` indirection, then the
    /// provider's conventional environment variables.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if let Some(var_name) = key.strip_prefix("env:") {
                return std::env::var(var_name).ok().filter(|v| !v.is_empty());
            }
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }

        self.credential_env
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
    }

    /// Get the base URL for the provider
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.protocol.default_base_url().to_string())
    }

    /// Default model followed by any additional models, without duplicates
    pub fn supported_models(&self) -> Vec<String> {
        let mut models = vec![self.model.clone()];
        for model in &self.models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "providers[].id".to_string(),
            });
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: format!("providers.{}.model", self.id),
            });
        }

        let base_url = self.base_url();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: format!("providers.{}.base_url", self.id),
                value: base_url,
            });
        }

        if let Some(temp) = self.params.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(ConfigError::InvalidValue {
                    field: format!("providers.{}.params.temperature", self.id),
                    value: temp.to_string(),
                });
            }
        }

        if let Some(top_p) = self.params.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ConfigError::InvalidValue {
                    field: format!("providers.{}.params.top_p", self.id),
                    value: top_p.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Settings for the shipped tool executors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory `read_file` resolves relative names against; `~` is expanded
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// Timeout for `fetch_url` requests
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Output cap for `read_file` and `fetch_url`
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl ToolsConfig {
    /// Resolve the workspace root, falling back to the current directory
    pub fn resolved_workspace_root(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) => {
                let raw = root.to_string_lossy();
                PathBuf::from(shellexpand::tilde(&raw).into_owned())
            }
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Top-level resolved configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    /// Configured providers
    #[serde(default = "ProviderSettings::builtin_catalog")]
    pub providers: Vec<ProviderSettings>,
    /// Provider used when a request does not name one
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Round-trip timing and preamble
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Tool executor settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            providers: ProviderSettings::builtin_catalog(),
            default_provider: Some("claude".to_string()),
            orchestrator: OrchestratorConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl SwitchboardConfig {
    /// Get provider settings by id
    pub fn get_provider(&self, id: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "providers[].id".to_string(),
                    value: format!("duplicate provider id '{}'", provider.id),
                });
            }
        }

        if let Some(default) = &self.default_provider {
            if self.get_provider(default).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "default_provider".to_string(),
                    value: default.clone(),
                });
            }
        }

        self.orchestrator.validate()
    }
}
