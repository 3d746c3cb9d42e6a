use crate::config::McpServerConfig;
use crate::types::McpTool;

/// Allow/deny lists applied to a server's advertised tools.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl ToolFilter {
    pub fn new(allowed: Vec<String>, denied: Vec<String>) -> Self {
        Self { allowed, denied }
    }

    pub fn from_config(config: &McpServerConfig) -> Self {
        Self::new(config.allowed_tools.clone(), config.denied_tools.clone())
    }

    /// An empty allow list admits everything; the deny list always wins.
    pub fn permits(&self, name: &str) -> bool {
        if !self.allowed.is_empty() && !self.allowed.iter().any(|allowed| allowed == name) {
            return false;
        }
        !self.denied.iter().any(|denied| denied == name)
    }

    pub fn apply(&self, tools: Vec<McpTool>) -> Vec<McpTool> {
        tools
            .into_iter()
            .filter(|tool| self.permits(&tool.name))
            .collect()
    }
}
