use std::time::Duration;

use thiserror::Error;

/// Turn-ending failures. Everything recoverable inside a turn is carried as
/// data (tool results, fallback messages) instead.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Model request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Tool error: {0}")]
    Tool(String),
}
