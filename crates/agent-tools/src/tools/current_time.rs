use agent_core::tools::{Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;

/// Tool for reading the local clock
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "strftime format string, RFC 3339 when omitted"
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let now = Local::now();
        let text = match args["format"].as_str() {
            Some(format) if !format.trim().is_empty() => {
                let items: Vec<_> = chrono::format::StrftimeItems::new(format).collect();
                if items.contains(&chrono::format::Item::Error) {
                    return Err(ToolError::InvalidArguments(format!(
                        "Invalid time format '{}'",
                        format
                    )));
                }
                now.format_with_items(items.into_iter()).to_string()
            }
            _ => now.to_rfc3339(),
        };
        Ok(ToolOutput::ok(text))
    }
}
