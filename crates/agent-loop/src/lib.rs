pub mod agent;
pub mod approval;
pub mod config;
pub mod parser;

pub use agent::{
    Agent, TurnOutcome, ABORTED_RESULT, FALLBACK_RESPONSE, MAX_STEPS_RESPONSE,
};
pub use approval::{ApprovalGate, ApprovalRequest, AutoApprove, ChannelApprovalGate, RejectAll};
pub use config::{AgentConfig, DEFAULT_SYSTEM_PROMPT};
pub use parser::parse_embedded_calls;
