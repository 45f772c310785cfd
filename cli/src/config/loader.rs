//! CLI configuration loader for Switchboard
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./switchboard.json or ./.switchboard/config.json
//! 3. Git repository root: <repo_root>/.switchboard/config.json
//! 4. XDG config: $XDG_CONFIG_HOME/switchboard/config.json or ~/.config/switchboard/config.json
//! 5. Built-in provider catalog with credentials from the environment

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use switchboard_core::{ProviderSettings, SwitchboardConfig};
use tracing::debug;

const CONFIG_DIR: &str = ".switchboard";
const CONFIG_FILE: &str = "config.json";
const CWD_CONFIG_FILE: &str = "switchboard.json";

/// CLI configuration loader
#[derive(Debug, Clone, Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    provider_override: Option<String>,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
    preamble_override: Option<String>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Select the provider the other overrides apply to
    pub fn with_provider_override(mut self, provider: String) -> Self {
        self.provider_override = Some(provider);
        self
    }

    /// Set API key override
    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set model override
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Replace the orchestrator's system preamble
    pub fn with_preamble_override(mut self, preamble: String) -> Self {
        self.preamble_override = Some(preamble);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<SwitchboardConfig> {
        // Step 1: Find and load base configuration
        let mut config = if let Some(override_path) = &self.config_override {
            let expanded = expand_path(override_path);
            self.load_from_path(&expanded).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply flag overrides
        self.apply_overrides(&mut config)?;

        // Step 3: Validate the resolved configuration
        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(config)
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<SwitchboardConfig> {
        let cwd = std::env::current_dir()?;

        // 1. Current working directory
        for candidate in [
            cwd.join(CWD_CONFIG_FILE),
            cwd.join(CONFIG_DIR).join(CONFIG_FILE),
        ] {
            if candidate.is_file() {
                return self.load_file(&candidate).await;
            }
        }

        // 2. Git repository root
        if let Some(root) = find_git_root(&cwd) {
            let candidate = root.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return self.load_file(&candidate).await;
            }
        }

        // 3. XDG config directory
        if let Some(dir) = xdg_config_dir() {
            let candidate = dir.join("switchboard").join(CONFIG_FILE);
            if candidate.is_file() {
                return self.load_file(&candidate).await;
            }
        }

        // 4. Built-in catalog; credentials come from the environment
        debug!("No config file found, using built-in provider catalog");
        Ok(SwitchboardConfig::default())
    }

    fn apply_overrides(&self, config: &mut SwitchboardConfig) -> Result<()> {
        if let Some(preamble) = &self.preamble_override {
            config.orchestrator.system_preamble = Some(preamble.clone());
        }

        if let Some(provider) = &self.provider_override {
            if config.get_provider(provider).is_none() {
                let builtin = ProviderSettings::builtin(provider).ok_or_else(|| {
                    let known: Vec<_> = config.providers.iter().map(|p| p.id.as_str()).collect();
                    anyhow!(
                        "Unknown provider '{}' (configured: {})",
                        provider,
                        known.join(", ")
                    )
                })?;
                config.providers.push(builtin);
            }
            config.default_provider = Some(provider.clone());
        }

        let has_provider_overrides = self.api_key_override.is_some()
            || self.base_url_override.is_some()
            || self.model_override.is_some();
        if !has_provider_overrides {
            return Ok(());
        }

        let target = config
            .default_provider
            .clone()
            .or_else(|| config.providers.first().map(|p| p.id.clone()))
            .ok_or_else(|| anyhow!("No providers configured to apply overrides to"))?;
        let settings = config
            .providers
            .iter_mut()
            .find(|p| p.id == target)
            .ok_or_else(|| anyhow!("Default provider '{}' is not configured", target))?;

        if let Some(api_key) = &self.api_key_override {
            settings.api_key = Some(api_key.clone());
        }
        if let Some(base_url) = &self.base_url_override {
            settings.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            settings.model = model.clone();
        }
        Ok(())
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<SwitchboardConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join(CONFIG_FILE);
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<SwitchboardConfig> {
        debug!(path = %path.display(), "Loading config file");
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Walk up from `start` looking for a `.git` entry
fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".config")),
    }
}
