//! Tool registry for the agent loop.
//!
//! In-process tools and tools served by a remote MCP server are registered
//! side by side and dispatched through [`ToolRegistry::execute`].

mod error;
pub mod registry;
pub mod tools;

pub use error::RegistryError;
pub use registry::ToolRegistry;
pub use tools::{CurrentTimeTool, EchoTool, FnTool};
