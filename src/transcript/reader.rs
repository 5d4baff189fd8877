//! Incremental transcript reads.
//!
//! A transcript is read as a sequence of newline-terminated lines. The line
//! count returned by [`read_transcript`] is what a caller persists as the
//! agent's cursor; an unterminated trailing fragment (the agent is mid-write)
//! is neither decoded nor counted, so it is delivered whole on a later read.

use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::{Entry, EntryCollector, decode_line};
use crate::config::CrewConfig;
use crate::models::AgentKind;
use crate::sessions::{locator_for, resolve_session_file};
use crate::storage::Storage;
use crate::{Error, Result};

/// Entries decoded from a transcript plus the number of complete lines in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub entries: Vec<Entry>,
    pub line_count: u64,
}

/// Decode every complete line after the first `from_line`.
///
/// Has no side effects on storage.
pub fn read_transcript(path: &Path, from_line: u64, kind: AgentKind) -> Result<Transcript> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            Error::NotFound(format!("Transcript not found: {}", path.display()))
        }
        _ => Error::Io(e),
    })?;
    let mut reader = BufReader::new(file);

    let mut collector = EntryCollector::default();
    let mut line_count: u64 = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            trace!(bytes = buf.len(), "leaving unterminated trailing line for a later read");
            break;
        }
        line_count += 1;
        if line_count <= from_line {
            continue;
        }
        match decode_line(kind, &buf) {
            Some(decoded) => collector.push(decoded),
            None => trace!(line = line_count, "skipped undecodable line"),
        }
    }

    if from_line > line_count {
        debug!(
            path = %path.display(),
            from_line,
            line_count,
            "cursor is past the end of the transcript"
        );
    }

    Ok(Transcript {
        entries: collector.finish(),
        line_count,
    })
}

/// Transcript entries delivered for one agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentTranscript {
    pub agent: String,
    pub session_file: PathBuf,
    pub entries: Vec<Entry>,
    /// Cursor after this read (for `logs`, the stored cursor, unchanged).
    pub cursor: u64,
}

fn read_for_agent(
    storage: &mut Storage,
    config: &CrewConfig,
    name: &str,
    from_start: bool,
) -> Result<(AgentTranscript, u64)> {
    let agent = storage.get_agent(name)?;
    let locator = locator_for(agent.kind, config);
    let session_file = resolve_session_file(storage, &agent, &locator)?;

    let from_line = if from_start { 0 } else { agent.cursor };
    let transcript = read_transcript(&session_file, from_line, agent.kind)?;
    Ok((
        AgentTranscript {
            agent: agent.name,
            session_file,
            entries: transcript.entries,
            cursor: agent.cursor,
        },
        transcript.line_count,
    ))
}

/// Entries added since the agent's cursor; advances the stored cursor.
///
/// If anything fails before the cursor is persisted, a retry returns the
/// same entries again.
pub fn peek(storage: &mut Storage, config: &CrewConfig, name: &str) -> Result<AgentTranscript> {
    let (mut result, line_count) = read_for_agent(storage, config, name, false)?;
    storage.update_cursor(name, line_count)?;
    result.cursor = result.cursor.max(line_count);
    debug!(
        agent = name,
        entries = result.entries.len(),
        cursor = result.cursor,
        "peeked transcript"
    );
    Ok(result)
}

/// The full transcript from the beginning. The stored cursor is untouched.
pub fn logs(storage: &mut Storage, config: &CrewConfig, name: &str) -> Result<AgentTranscript> {
    let (result, _) = read_for_agent(storage, config, name, true)?;
    Ok(result)
}
