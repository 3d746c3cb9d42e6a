pub mod error;
pub mod events;
pub mod types;

pub use error::AgentError;
pub use events::{AgentEvent, ProposedToolCall, ToolProposal};
pub use types::{Conversation, Message, Role};
