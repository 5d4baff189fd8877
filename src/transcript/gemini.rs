//! Gemini `--output-format stream-json` events.
//!
//! ```text
//! {"type":"init","session_id":"...","model":"gemini-2.5-pro"}
//! {"type":"message","role":"user","content":"fix the build"}
//! {"type":"message","role":"assistant","content":"Looking","delta":true}
//! {"type":"tool_use","tool_name":"run_shell_command","tool_id":"t1","parameters":{...}}
//! {"type":"tool_result","tool_id":"t1","status":"success","output":"..."}
//! {"type":"result","status":"success","stats":{...}}
//! ```

use serde_json::Value;

use super::{Decoded, Entry, EntryKind};

pub(super) fn decode(event_type: &str, line: &Value) -> Decoded {
    match event_type {
        "message" => decode_message(line),
        "thought" | "thinking" | "reasoning" => {
            let text = first_str(line, &["content", "text", "description"]);
            match text {
                Some(text) if !text.is_empty() => {
                    Decoded::Entry(Entry::new(EntryKind::Reasoning, text))
                }
                _ => Decoded::Nothing,
            }
        }
        "tool_use" => {
            let Some(name) = first_str(line, &["tool_name", "name"]) else {
                return Decoded::Nothing;
            };
            let params = line
                .get("parameters")
                .or_else(|| line.get("args"))
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            Decoded::Entry(Entry::tool(name, params))
        }
        "tool_result" => {
            let output = first_str(line, &["output"])
                .or_else(|| line.pointer("/error/message").and_then(Value::as_str))
                .unwrap_or("");
            Decoded::Entry(Entry::tool_output(output))
        }
        // init, result, error and anything newer carry no conversation text.
        _ => Decoded::Nothing,
    }
}

fn decode_message(line: &Value) -> Decoded {
    let content = first_str(line, &["content"]).unwrap_or("");
    match line.get("role").and_then(Value::as_str) {
        Some("assistant") => {
            if line.get("delta").and_then(Value::as_bool).unwrap_or(false) {
                Decoded::Delta(content.to_string())
            } else if content.is_empty() {
                Decoded::Nothing
            } else {
                Decoded::Entry(Entry::new(EntryKind::Message, content))
            }
        }
        Some("user") if !content.is_empty() => {
            Decoded::Entry(Entry::new(EntryKind::User, content))
        }
        _ => Decoded::Nothing,
    }
}

fn first_str<'a>(line: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| line.get(*field).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use crate::models::AgentKind;
    use crate::transcript::{Decoded, Entry, EntryKind, decode_line, decode_lines};
    use serde_json::json;

    fn decode(line: serde_json::Value) -> Decoded {
        decode_line(AgentKind::Gemini, line.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_init_and_result_yield_nothing() {
        assert_eq!(
            decode(json!({"type": "init", "session_id": "abc", "model": "gemini-2.5-pro"})),
            Decoded::Nothing
        );
        assert_eq!(
            decode(json!({"type": "result", "status": "success", "stats": {"total_tokens": 10}})),
            Decoded::Nothing
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            decode(json!({"type": "message", "role": "user", "content": "fix it"})),
            Decoded::Entry(Entry::new(EntryKind::User, "fix it"))
        );
        assert_eq!(
            decode(json!({"type": "message", "role": "assistant", "content": "Done."})),
            Decoded::Entry(Entry::new(EntryKind::Message, "Done."))
        );
        assert_eq!(
            decode(json!({"type": "message", "role": "assistant", "content": "Do", "delta": true})),
            Decoded::Delta("Do".to_string())
        );
    }

    #[test]
    fn test_thought_is_reasoning() {
        assert_eq!(
            decode(json!({"type": "thought", "content": "Check the config first"})),
            Decoded::Entry(Entry::new(EntryKind::Reasoning, "Check the config first"))
        );
    }

    #[test]
    fn test_tool_use_and_result() {
        let Decoded::Entry(tool) = decode(json!({
            "type": "tool_use",
            "tool_name": "read_file",
            "tool_id": "read_file-1",
            "parameters": {"absolute_path": "/repo/Cargo.toml"}
        })) else {
            panic!("expected entry");
        };
        assert_eq!(tool.content, "[tool: read_file]");
        assert_eq!(tool.tool.unwrap().params["absolute_path"], "/repo/Cargo.toml");

        assert_eq!(
            decode(json!({"type": "tool_result", "tool_id": "read_file-1", "status": "success", "output": "[package]"})),
            Decoded::Entry(Entry::new(EntryKind::ToolOutput, "[package]"))
        );
        assert_eq!(
            decode(json!({"type": "tool_result", "status": "error", "error": {"type": "x", "message": "denied"}})),
            Decoded::Entry(Entry::new(EntryKind::ToolOutput, "denied"))
        );
    }

    #[test]
    fn test_delta_run_collapses_into_one_message() {
        let lines = [
            json!({"type": "init", "session_id": "abc"}).to_string(),
            json!({"type": "message", "role": "user", "content": "hello"}).to_string(),
            json!({"type": "message", "role": "assistant", "content": "Hi", "delta": true}).to_string(),
            json!({"type": "message", "role": "assistant", "content": " there", "delta": true}).to_string(),
            json!({"type": "message", "role": "assistant", "content": "!", "delta": true}).to_string(),
            json!({"type": "result", "status": "success"}).to_string(),
        ];
        let entries = decode_lines(AgentKind::Gemini, lines.iter().map(|l| l.as_bytes()));
        assert_eq!(
            entries,
            vec![
                Entry::new(EntryKind::User, "hello"),
                Entry::new(EntryKind::Message, "Hi there!"),
            ]
        );
    }

    #[test]
    fn test_delta_run_flushed_at_end_of_input() {
        let lines = [
            json!({"type": "message", "role": "assistant", "content": "partial", "delta": true}).to_string(),
            json!({"type": "message", "role": "assistant", "content": " answer", "delta": true}).to_string(),
        ];
        let entries = decode_lines(AgentKind::Gemini, lines.iter().map(|l| l.as_bytes()));
        assert_eq!(entries, vec![Entry::new(EntryKind::Message, "partial answer")]);
    }

    #[test]
    fn test_delta_run_flushed_by_tool_use() {
        let lines = [
            json!({"type": "message", "role": "assistant", "content": "Let me look", "delta": true}).to_string(),
            json!({"type": "tool_use", "tool_name": "glob", "parameters": {"pattern": "*.rs"}}).to_string(),
            json!({"type": "tool_result", "output": "main.rs"}).to_string(),
            json!({"type": "message", "role": "assistant", "content": "Found it", "delta": true}).to_string(),
        ];
        let kinds: Vec<(EntryKind, String)> =
            decode_lines(AgentKind::Gemini, lines.iter().map(|l| l.as_bytes()))
                .into_iter()
                .map(|e| (e.kind, e.content))
                .collect();
        assert_eq!(
            kinds,
            vec![
                (EntryKind::Message, "Let me look".to_string()),
                (EntryKind::Tool, "[tool: glob]".to_string()),
                (EntryKind::ToolOutput, "main.rs".to_string()),
                (EntryKind::Message, "Found it".to_string()),
            ]
        );
    }
}
