use crate::tools::{ToolOrigin, ToolResult};
use serde::{Deserialize, Serialize};

/// A single call inside a proposed batch, as shown to whoever decides on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument payload exactly as the model produced it.
    pub arguments: String,
    /// `None` when the name is not registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<ToolOrigin>,
}

/// The batch of tool calls the model asked for in one response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolProposal {
    pub calls: Vec<ProposedToolCall>,
    pub requires_approval: bool,
}

impl ToolProposal {
    pub fn remote_calls(&self) -> impl Iterator<Item = &ProposedToolCall> {
        self.calls
            .iter()
            .filter(|call| call.origin == Some(ToolOrigin::Remote))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ThinkingStarted {
        iteration: usize,
    },

    ThinkingFinished {
        iteration: usize,
    },

    /// Emitted for every batch, including local-only batches that run
    /// without approval.
    ToolProposal {
        proposal: ToolProposal,
    },

    ToolStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolComplete {
        tool_call_id: String,
        result: ToolResult,
    },

    /// All results of a batch, in call order.
    ToolResults {
        results: Vec<ToolResult>,
    },

    Complete {
        response: String,
    },

    Cancelled,

    Error {
        message: String,
    },
}
