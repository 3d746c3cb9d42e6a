use agent_core::{tools::ToolCall, tools::ToolSchema, Message};
use async_trait::async_trait;
use thiserror::Error;

use crate::config::ModelConfig;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// What the model answered: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// One chat completion round trip.
    ///
    /// # Arguments
    /// * `model` - Endpoint, model name and credentials to use
    /// * `messages` - Chat messages
    /// * `tools` - Available tools; omitted from the request when empty
    async fn chat(
        &self,
        model: &ModelConfig,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantReply>;
}
