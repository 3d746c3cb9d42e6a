use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// A call that did not come with an id of its own (recovered from text).
    pub fn synthetic(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(
            format!("call_{}", Uuid::new_v4().simple()),
            name,
            arguments,
        )
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionSchema,
}

impl ToolSchema {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolOrigin {
    Local,
    Remote,
}

impl std::fmt::Display for ToolOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolOrigin::Local => write!(f, "local"),
            ToolOrigin::Remote => write!(f, "remote"),
        }
    }
}

/// Outcome of one executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub name: String,
    pub success: bool,
    pub result: String,
    pub origin: ToolOrigin,
    /// Protocol-specific extras, e.g. the request a remote tool was issued with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, origin: ToolOrigin, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            result: result.into(),
            origin,
            payload: None,
        }
    }

    pub fn failure(name: impl Into<String>, origin: ToolOrigin, result: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(name, origin, result)
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Text recorded in the conversation for this result.
    pub fn to_message_content(&self) -> String {
        if self.success {
            self.result.clone()
        } else {
            format!("Error: {}", self.result)
        }
    }
}
