//! Transcript decoding.
//!
//! Agents write append-only JSON-Lines logs in one of two external formats:
//!
//! - **codex** rollout files: one self-contained `{"type", "payload"}` record
//!   per line.
//! - **gemini** `stream-json` captures: one event per line, where assistant
//!   text may arrive as a run of `"delta": true` fragments.
//!
//! Both are normalized into [`Entry`] values. Decoding is a pure function of
//! one line; the only state is the [`EntryCollector`] that merges delta runs
//! while a single read is in progress.

mod codex;
mod gemini;
pub mod reader;

pub use reader::{AgentTranscript, Transcript, logs, peek, read_transcript};

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::models::AgentKind;

/// Tool output longer than this many characters is truncated.
pub const TOOL_OUTPUT_MAX_RUNES: usize = 200;

/// Kind of a normalized transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    User,
    Message,
    Reasoning,
    Tool,
    ToolOutput,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::User => "user",
            EntryKind::Message => "message",
            EntryKind::Reasoning => "reasoning",
            EntryKind::Tool => "tool",
            EntryKind::ToolOutput => "tool_output",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool name and structured arguments of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub name: String,
    pub params: Value,
}

/// One normalized transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolCall>,
}

impl Entry {
    pub fn new(kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            tool: None,
        }
    }

    pub fn tool(name: impl Into<String>, params: Value) -> Self {
        let name = name.into();
        Self {
            kind: EntryKind::Tool,
            content: format!("[tool: {}]", name),
            tool: Some(ToolCall { name, params }),
        }
    }

    pub fn tool_output(output: &str) -> Self {
        Self::new(
            EntryKind::ToolOutput,
            truncate_runes(output, TOOL_OUTPUT_MAX_RUNES),
        )
    }
}

/// Result of decoding one well-formed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Entry(Entry),
    /// A fragment of assistant text that continues until the next non-delta line.
    Delta(String),
    /// Metadata, statistics, or an event type with nothing to show.
    Nothing,
}

/// Decode one raw line with the decoder for `kind`.
///
/// Returns `None` for a line that is blank or not a JSON object with a
/// string `type`; such lines are skipped without affecting anything else.
pub fn decode_line(kind: AgentKind, line: &[u8]) -> Option<Decoded> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    let value: Value = serde_json::from_slice(line).ok()?;
    let event_type = value.get("type")?.as_str()?;
    let decoded = match kind {
        AgentKind::Codex => codex::decode(event_type, &value),
        AgentKind::Gemini => gemini::decode(event_type, &value),
    };
    Some(decoded)
}

/// Collects decoded lines into entries, merging consecutive delta fragments.
#[derive(Debug, Default)]
pub struct EntryCollector {
    entries: Vec<Entry>,
    pending: Option<String>,
}

impl EntryCollector {
    pub fn push(&mut self, decoded: Decoded) {
        match decoded {
            Decoded::Delta(text) => self.pending.get_or_insert_with(String::new).push_str(&text),
            Decoded::Entry(entry) => {
                self.flush();
                self.entries.push(entry);
            }
            Decoded::Nothing => self.flush(),
        }
    }

    fn flush(&mut self) {
        if let Some(text) = self.pending.take() {
            if !text.is_empty() {
                self.entries.push(Entry::new(EntryKind::Message, text));
            }
        }
    }

    /// Flush any buffered delta run and return the entries.
    pub fn finish(mut self) -> Vec<Entry> {
        self.flush();
        self.entries
    }
}

/// Decode a sequence of raw lines into entries.
pub fn decode_lines<'a, I>(kind: AgentKind, lines: I) -> Vec<Entry>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut collector = EntryCollector::default();
    for line in lines {
        if let Some(decoded) = decode_line(kind, line) {
            collector.push(decoded);
        }
    }
    collector.finish()
}

/// Truncate to at most `max` characters, appending `...` when anything was cut.
/// Cuts on character boundaries, never inside a multi-byte sequence.
pub fn truncate_runes(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Non-empty `text` fields of an array of objects, joined by newlines.
pub(crate) fn join_text_parts(parts: Option<&Value>) -> String {
    parts
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}
