//! Configuration for tagloop
//!
//! A single JSON file under `~/.tagloop`. Every field has a default, so a
//! missing file or a partial one both load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, workspace_path};

/// Environment variables consulted, in order, when no key is configured
pub const API_KEY_VARS: [&str; 2] = ["TAGLOOP_API_KEY", "OPENROUTER_API_KEY"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Agent loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Run calls cut off before their closing tag with the arguments received
    #[serde(default = "default_true")]
    pub execute_truncated_calls: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            execute_truncated_calls: true,
        }
    }
}

fn default_workspace() -> String {
    "~/.tagloop/workspace".to_string()
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_iterations() -> u32 {
    50
}

/// Context compaction switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub summarize: bool,
    #[serde(default = "default_true")]
    pub prune: bool,
    #[serde(default = "default_true")]
    pub retain_first_result: bool,
    #[serde(default)]
    pub max_context_words: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            summarize: true,
            prune: true,
            retain_first_result: true,
            max_context_words: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Action settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout(),
            auto_approve: false,
            max_page_chars: default_max_page_chars(),
        }
    }
}

fn default_shell_timeout() -> u64 {
    120
}

fn default_max_page_chars() -> usize {
    10000
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ No config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("◆ Loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Workspace directory with `~` expanded
    pub fn workspace_path(&self) -> PathBuf {
        paths::expand_home(&self.agent.workspace)
    }

    /// Configured key, else the first set of [`API_KEY_VARS`]
    pub fn api_key(&self) -> Option<String> {
        self.api_key_from(|name| std::env::var(name).ok())
    }

    /// Like [`Config::api_key`] with an explicit environment lookup
    pub fn api_key_from<F>(&self, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.provider.api_key.is_empty() {
            return Some(self.provider.api_key.clone());
        }
        API_KEY_VARS
            .iter()
            .filter_map(|name| env(name))
            .find(|key| !key.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Endpoint override, if a non-empty one is set
    pub fn api_base(&self) -> Option<String> {
        self.provider
            .api_base
            .as_ref()
            .filter(|base| !base.is_empty())
            .cloned()
    }

    pub fn model(&self) -> String {
        self.agent.model.clone()
    }
}

/// Write the default config if missing and create the workspace
pub async fn init() -> Result<Config> {
    init_at(&config_path()).await
}

/// [`init`] with an explicit config location
pub async fn init_at(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        warn!("◆ Config already exists at {:?}", config_path);
    } else {
        Config::default().save_to(config_path).await?;
        info!("◆ Config written to {:?}", config_path);
    }

    let config = Config::load_from(config_path).await?;
    let workspace = config.workspace_path();
    paths::ensure_dir(&workspace).await?;
    info!("◆ Workspace ready at {:?}", workspace);

    Ok(config)
}
