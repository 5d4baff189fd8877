//! Codex rollout format.
//!
//! Each line is `{"timestamp", "type", "payload"}`. Only `response_item`
//! records carry conversation content; `session_meta`, `turn_context`,
//! `event_msg` (which mirrors response items and adds token counts) and
//! `compacted` are bookkeeping.

use serde_json::Value;

use super::{Decoded, Entry, EntryKind, join_text_parts};

pub(super) fn decode(event_type: &str, line: &Value) -> Decoded {
    match (event_type, line.get("payload")) {
        ("response_item", Some(payload)) => decode_response_item(payload),
        _ => Decoded::Nothing,
    }
}

fn decode_response_item(payload: &Value) -> Decoded {
    let item_type = payload.get("type").and_then(Value::as_str).unwrap_or("");
    match item_type {
        "message" => decode_message(payload),
        "reasoning" => {
            // Displayable text sits one level down, in summary[].text.
            let text = join_text_parts(payload.get("summary"));
            if text.is_empty() {
                Decoded::Nothing
            } else {
                Decoded::Entry(Entry::new(EntryKind::Reasoning, text))
            }
        }
        "function_call" => decode_tool_call(payload, "arguments"),
        "custom_tool_call" => decode_tool_call(payload, "input"),
        "local_shell_call" => Decoded::Entry(Entry::tool(
            "shell",
            payload.get("action").cloned().unwrap_or(Value::Null),
        )),
        "web_search_call" => Decoded::Entry(Entry::tool(
            "web_search",
            payload.get("action").cloned().unwrap_or(Value::Null),
        )),
        "function_call_output" | "custom_tool_call_output" => {
            Decoded::Entry(Entry::tool_output(&output_text(payload.get("output"))))
        }
        _ => Decoded::Nothing,
    }
}

fn decode_message(payload: &Value) -> Decoded {
    let kind = match payload.get("role").and_then(Value::as_str) {
        Some("assistant") => EntryKind::Message,
        Some("user") => EntryKind::User,
        _ => return Decoded::Nothing,
    };
    let text = join_text_parts(payload.get("content"));
    if text.is_empty() {
        return Decoded::Nothing;
    }
    Decoded::Entry(Entry::new(kind, text))
}

/// Arguments arrive as a JSON-encoded string; keep the raw string when it
/// isn't valid JSON (custom tools take free-form input).
fn decode_tool_call(payload: &Value, args_field: &str) -> Decoded {
    let Some(name) = payload.get("name").and_then(Value::as_str) else {
        return Decoded::Nothing;
    };
    let params = match payload.get(args_field) {
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Null,
    };
    Decoded::Entry(Entry::tool(name, params))
}

/// Output is usually a plain string, sometimes `{"content": "..."}`.
fn output_text(output: Option<&Value>) -> String {
    match output {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(obj)) => match obj.get("content") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => join_text_parts(Some(other)),
            None => Value::Object(obj.clone()).to_string(),
        },
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
