use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{
    adapter::agent::AgentRole,
    domain::constant::{
        DEFAULT_HISTORY_LIMIT, DEFAULT_MAILBOX_CAPACITY, DEFAULT_STEP_TIMEOUT_SECS, DEFAULT_SUBSCRIBER_CAPACITY
    }
};

/// Configuration structure for the swarm engine
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Capacities and deadlines of the engine core
    pub runtime:    RuntimeConfig,
    /// Language completion backend
    pub completion: CompletionConfig,
    /// Agents registered with the coordinator at boot
    pub agents:     Vec<AgentConfig>
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime:    RuntimeConfig::default(),
            completion: CompletionConfig::default(),
            agents:     vec![
                AgentConfig::new("researcher", AgentRole::Researcher),
                AgentConfig::new("analyst", AgentRole::Analyst),
                AgentConfig::new("writer", AgentRole::Writer),
            ]
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mailbox_capacity:    usize,
    pub subscriber_capacity: usize,
    pub step_timeout_secs:   u64,
    pub history_limit:       usize
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity:    DEFAULT_MAILBOX_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            step_timeout_secs:   DEFAULT_STEP_TIMEOUT_SECS,
            history_limit:       DEFAULT_HISTORY_LIMIT
        }
    }
}

impl RuntimeConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// Which completion backend to build
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBackend {
    /// Deterministic offline replies
    #[default]
    Mock,
    /// OpenAI-compatible chat completions endpoint
    OpenAi
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub backend:              CompletionBackend,
    pub model:                String,
    pub base_url:             String,
    /// Name of the environment variable holding the API key
    pub api_key_env:          String,
    pub temperature:          f32,
    pub max_tokens:           u32,
    pub request_timeout_secs: u64,
    /// Extra keyword -> reply pairs for the mock backend
    pub canned:               BTreeMap<String, String>
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            backend:              CompletionBackend::Mock,
            model:                "gpt-4o-mini".to_string(),
            base_url:             "https://api.openai.com/v1".to_string(),
            api_key_env:          "OPENAI_API_KEY".to_string(),
            temperature:          0.7,
            max_tokens:           1024,
            request_timeout_secs: 30,
            canned:               BTreeMap::new()
        }
    }
}

impl CompletionConfig {
    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentConfig {
    pub id:            String,
    #[serde(default)]
    pub role:          AgentRole,
    /// Replaces the role's default system prompt
    #[serde(default)]
    pub system_prompt: Option<String>
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, role: AgentRole) -> Self {
        Self { id: id.into(), role, system_prompt: None }
    }
}

impl AppConfig {
    /// Parse configuration from YAML content and validate it
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.runtime.mailbox_capacity == 0 {
            bail!("runtime.mailbox_capacity must be greater than zero");
        }
        if self.runtime.subscriber_capacity == 0 {
            bail!("runtime.subscriber_capacity must be greater than zero");
        }
        if self.runtime.step_timeout_secs == 0 {
            bail!("runtime.step_timeout_secs must be greater than zero");
        }

        let mut ids = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                bail!("agent ids must not be empty");
            }
            if !ids.insert(agent.id.as_str()) {
                bail!("agent id '{}' is configured twice", agent.id);
            }
        }

        Ok(())
    }
}

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "swarm-engine").context("Failed to determine project directories")
}

/// Get the config file path
pub fn get_config_file_path() -> Result<PathBuf> {
    let project_dirs = get_project_dirs()?;
    Ok(project_dirs.config_dir().join("config.yaml"))
}

/// Load configuration from `path`, or from the default location
///
/// An explicit path must exist. Without one, a missing default file yields the
/// built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let default_path = get_config_file_path()?;
            if !default_path.exists() {
                return Ok(AppConfig::default());
            }
            default_path
        }
    };

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    AppConfig::from_yaml(&content).with_context(|| format!("Invalid config file: {}", config_path.display()))
}

/// Save configuration to `path`, creating parent directories
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let content = serde_yaml::to_string(config).context("Failed to serialize config")?;

    fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}
