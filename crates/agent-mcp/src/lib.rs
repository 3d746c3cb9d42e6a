//! Remote tool access over the Model Context Protocol.
//!
//! [`RemoteToolTransport`] keeps one logical session to a remote tool server
//! alive: connects on demand, probes liveness before each operation and
//! reconnects with bounded exponential backoff.

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tool_filter;
pub mod transports;
pub mod types;

pub use config::*;
pub use connection::{RemoteToolCaller, RemoteToolTransport, NO_DATA_MESSAGE};
pub use error::{McpError, Result};
pub use protocol::{McpProtocolClient, McpTransport};
pub use session::{HttpConnector, McpConnector, McpSession};
pub use tool_filter::ToolFilter;
pub use transports::StreamableHttpTransport;
pub use types::*;
