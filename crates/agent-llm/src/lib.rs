pub mod config;
pub mod provider;
pub mod providers;

pub use config::ModelConfig;
pub use provider::{AssistantReply, LLMError, LLMProvider, Result};
pub use providers::OpenAIProvider;
