use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The server answered with an error status. The request reached it, so
    /// this is never treated as a broken link.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server disconnected")]
    Disconnected,

    #[error(
        "Remote tool server unreachable after {attempts} reconnect attempts. \
         Please restart the session to reconnect."
    )]
    ReconnectExhausted { attempts: u32 },
}

impl McpError {
    /// Failures of the link itself, as opposed to the server refusing or
    /// failing a request. Only these are worth a reconnect and a retry.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            McpError::Transport(_)
                | McpError::Connection(_)
                | McpError::Timeout(_)
                | McpError::Disconnected
        )
    }

    /// Nothing more will be attempted until the session is restarted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, McpError::ReconnectExhausted { .. })
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            McpError::Timeout(e.to_string())
        } else if e.is_decode() {
            McpError::Protocol(e.to_string())
        } else {
            McpError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, McpError>;
