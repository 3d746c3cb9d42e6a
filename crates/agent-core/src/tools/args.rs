use crate::tools::ToolError;

/// Prefix of the tool-result text recorded when a call's arguments do not parse.
pub const INVALID_ARGUMENTS_PREFIX: &str = "Invalid JSON arguments";

/// Parse a model-supplied argument string. Blank input means "no arguments".
pub fn parse_tool_args(arguments: &str) -> std::result::Result<serde_json::Value, ToolError> {
    let args_raw = arguments.trim();

    if args_raw.is_empty() {
        return Ok(serde_json::json!({}));
    }

    serde_json::from_str(args_raw).map_err(|error| {
        ToolError::InvalidArguments(format!("{INVALID_ARGUMENTS_PREFIX}: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_arguments_are_an_empty_object() {
        assert_eq!(parse_tool_args("").unwrap(), json!({}));
        assert_eq!(parse_tool_args("   \n").unwrap(), json!({}));
    }

    #[test]
    fn object_arguments_parse() {
        let args = parse_tool_args(r#"{"id":"cpad"}"#).unwrap();
        assert_eq!(args["id"], "cpad");
    }

    #[test]
    fn malformed_arguments_report_invalid_json() {
        let error = parse_tool_args("{bad json").unwrap_err();
        match error {
            ToolError::InvalidArguments(message) => {
                assert!(message.starts_with(INVALID_ARGUMENTS_PREFIX));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
