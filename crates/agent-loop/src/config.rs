use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools \
when they help answer the user's request, and answer directly otherwise.";

/// Configuration for the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Tool batches allowed per user message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Hard limit on one model request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Most recent history entries sent along with the system prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            request_timeout_secs: default_request_timeout_secs(),
            history_window: default_history_window(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_max_iterations() -> usize {
    20
}

fn default_request_timeout_secs() -> u64 {
    300 // 5 minutes
}

fn default_history_window() -> usize {
    20
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
