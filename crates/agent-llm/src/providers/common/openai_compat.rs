//! OpenAI-compatible request serialization helpers.
//!
//! These helpers build a "compat" JSON body without leaking internal
//! `agent_core::Message` fields (like `id` / `created_at`) and read the
//! non-streaming chat completion response back into an [`AssistantReply`].

use agent_core::{
    agent::Role,
    tools::{FunctionCall, ToolCall, ToolSchema},
    Message,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{AssistantReply, LLMError, Result};

/// Convert internal [`Message`] values to an OpenAI-compatible JSON array.
pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };

            let mut msg = json!({
                "role": role,
                "content": m.content,
            });

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(tool_calls);
                if m.content.is_empty() {
                    msg["content"] = Value::Null;
                }
            }

            msg
        })
        .collect()
}

/// Convert internal [`ToolSchema`] values to the OpenAI `tools` array JSON.
pub fn tools_to_openai_compat_json(tools: &[ToolSchema]) -> Vec<Value> {
    tools.iter().map(|t| json!(t)).collect()
}

/// Build a non-streaming chat request body. `tools` and `tool_choice` are
/// only present when there is at least one tool.
pub fn build_openai_compat_body(model: &str, messages: &[Message], tools: &[ToolSchema]) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
    });

    if !tools.is_empty() {
        body["tools"] = json!(tools_to_openai_compat_json(tools));
        body["tool_choice"] = json!("auto");
    }

    body
}

#[derive(Debug, Deserialize)]
struct OpenAICompatResponse {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    message: OpenAICompatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAICompatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCall {
    id: Option<String>,
    function: OpenAICompatFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Read `choices[0].message` of a chat completion response.
pub fn parse_openai_compat_response(body: &str) -> Result<AssistantReply> {
    let response: OpenAICompatResponse = serde_json::from_str(body)?;
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(LLMError::Api("Response contained no choices".to_string()));
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            // Some compatible servers send arguments as an object.
            let arguments = match tc.function.arguments {
                Value::String(arguments) => arguments,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            match tc.id.filter(|id| !id.is_empty()) {
                Some(id) => ToolCall {
                    id,
                    tool_type: "function".to_string(),
                    function: FunctionCall {
                        name: tc.function.name,
                        arguments,
                    },
                },
                None => ToolCall::synthetic(tc.function.name, arguments),
            }
        })
        .collect();

    Ok(AssistantReply {
        content: choice.message.content,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tools::FunctionSchema;

    fn weather_tool() -> ToolSchema {
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: "search_weather".to_string(),
                description: "Search for weather information".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "location": { "type": "string" }
                    }
                }),
            },
        }
    }

    #[test]
    fn test_request_body_without_tools_omits_tool_fields() {
        let body = build_openai_compat_body("gpt-4o-mini", &[Message::user("Hello")], &[]);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_request_body_with_tools() {
        let body = build_openai_compat_body(
            "gpt-4o-mini",
            &[Message::user("Weather in Oslo?")],
            &[weather_tool()],
        );

        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_weather");
    }

    #[test]
    fn test_messages_omit_internal_fields() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::assistant("", Some(vec![ToolCall::new("call_1", "echo", "{}")])),
            Message::tool_result("call_1", "hi"),
        ];

        let json = messages_to_openai_compat_json(&messages);

        assert_eq!(json[0]["role"], "system");
        assert!(json[0].get("id").is_none());
        assert!(json[0].get("created_at").is_none());
        assert!(json[1]["content"].is_null());
        assert_eq!(json[1]["tool_calls"][0]["function"]["name"], "echo");
        assert_eq!(json[2]["role"], "tool");
        assert_eq!(json[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_text_response() {
        let reply = parse_openai_compat_response(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();

        assert_eq!(reply.content.as_deref(), Some("Hello!"));
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_tool_calls() {
        let reply = parse_openai_compat_response(
            r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
                {"id":"call_abc","type":"function","function":{"name":"search","arguments":"{\"q\":\"test\"}"}},
                {"type":"function","function":{"name":"lookup","arguments":{"id":7}}}
            ]}}]}"#,
        )
        .unwrap();

        assert_eq!(reply.content, None);
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].id, "call_abc");
        assert_eq!(reply.tool_calls[0].function.arguments, r#"{"q":"test"}"#);
        assert!(reply.tool_calls[1].id.starts_with("call_"));
        assert_eq!(reply.tool_calls[1].function.arguments, r#"{"id":7}"#);
    }

    #[test]
    fn test_missing_choices_is_api_error() {
        let result = parse_openai_compat_response(r#"{"choices":[]}"#);
        assert!(matches!(result, Err(LLMError::Api(_))));

        let result = parse_openai_compat_response(r#"{"object":"error"}"#);
        assert!(matches!(result, Err(LLMError::Api(_))));
    }

    #[test]
    fn test_invalid_json_response() {
        let result = parse_openai_compat_response("{not valid json}");
        assert!(matches!(result, Err(LLMError::Json(_))));
    }
}
