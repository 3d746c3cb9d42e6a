//! Recovery of tool calls written into the model's text.
//!
//! Some models ignore structured tool calling and write
//! `<tool_call>...</tool_call>` segments instead. Each segment is read as,
//! in order of preference:
//!
//! 1. a JSON object `{"name": ..., "arguments": ...}`
//! 2. `name({...})`
//! 3. a bare name, accepted only when it is a registered tool
//!
//! Anything else is skipped.

use std::sync::LazyLock;

use agent_core::ToolCall;
use regex::Regex;
use serde_json::Value;

static SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("Failed to compile tool_call segment regex")
});

static CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_.\-]*)\s*\((.*)\)$")
        .expect("Failed to compile function call regex")
});

static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("Failed to compile identifier regex")
});

/// Extract tool calls from tagged segments in `content`. Every recovered call
/// gets a generated id.
pub fn parse_embedded_calls(content: &str, is_registered: impl Fn(&str) -> bool) -> Vec<ToolCall> {
    SEGMENT_PATTERN
        .captures_iter(content)
        .filter_map(|captures| {
            let segment = captures.get(1)?.as_str().trim();
            let parsed = parse_json_call(segment)
                .or_else(|| parse_function_call(segment))
                .or_else(|| parse_bare_name(segment, &is_registered));
            if parsed.is_none() {
                log::debug!("Ignoring unrecognized tool_call segment: {}", segment);
            }
            parsed
        })
        .map(|(name, arguments)| ToolCall::synthetic(name, arguments))
        .collect()
}

fn parse_json_call(segment: &str) -> Option<(String, String)> {
    let value: Value = serde_json::from_str(segment).ok()?;
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match value.get("arguments") {
        None | Some(Value::Null) => "{}".to_string(),
        Some(Value::String(raw)) => raw.clone(),
        Some(other) => other.to_string(),
    };
    Some((name.to_string(), arguments))
}

fn parse_function_call(segment: &str) -> Option<(String, String)> {
    let captures = CALL_PATTERN.captures(segment)?;
    let name = captures.get(1)?.as_str();
    let raw = captures.get(2)?.as_str().trim();

    if raw.is_empty() {
        return Some((name.to_string(), "{}".to_string()));
    }
    let arguments: Value = serde_json::from_str(raw).ok()?;
    Some((name.to_string(), arguments.to_string()))
}

fn parse_bare_name(segment: &str, is_registered: &impl Fn(&str) -> bool) -> Option<(String, String)> {
    if IDENTIFIER_PATTERN.is_match(segment) && is_registered(segment) {
        Some((segment.to_string(), "{}".to_string()))
    } else {
        None
    }
}
