pub mod agent;
pub mod tools;

pub use agent::events::{AgentEvent, ProposedToolCall, ToolProposal};
pub use agent::types::{Conversation, Message, Role};
pub use agent::AgentError;
pub use tools::{
    parse_tool_args, FunctionCall, FunctionSchema, Tool, ToolCall, ToolError, ToolOrigin,
    ToolOutput, ToolResult, ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
