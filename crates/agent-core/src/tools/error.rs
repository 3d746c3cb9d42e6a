use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool backend is gone for good (e.g. reconnects exhausted). This is
    /// the only tool failure that ends a turn.
    #[error("Tool backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
