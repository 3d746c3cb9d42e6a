use std::fs;
use std::path::{Path, PathBuf};

use agent_llm::ModelConfig;
use agent_loop::AgentConfig;
use agent_mcp::McpServerConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "agent-cli";
const CONFIG_FILE: &str = "config.yaml";

/// Everything the shell reads from its YAML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    /// Key of the model selected at startup; the first model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_server: Option<McpServerConfig>,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            default_model: None,
            remote_server: None,
            agent: AgentConfig::default(),
        }
    }
}

fn default_models() -> Vec<ModelConfig> {
    let mut model = ModelConfig::new("gpt-4o-mini", "gpt-4o-mini");
    model.api_key_env = Some("OPENAI_API_KEY".to_string());
    vec![model]
}

/// `~/.config/agent-cli/config.yaml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl AppConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        if config.models.is_empty() {
            anyhow::bail!("at least one model must be configured");
        }
        Ok(config)
    }

    /// An explicit path must exist. Without one the default location is
    /// tried and built-in defaults are used when nothing is there.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}
