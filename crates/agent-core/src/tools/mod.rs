pub mod args;
pub mod error;
pub mod tool;
pub mod types;

pub use args::{parse_tool_args, INVALID_ARGUMENTS_PREFIX};
pub use error::{Result, ToolError};
pub use tool::{Tool, ToolOutput};
pub use types::{FunctionCall, FunctionSchema, ToolCall, ToolOrigin, ToolResult, ToolSchema};
