//! Line decoding for the `data:`-prefixed completion stream
//!
//! The body arrives in arbitrary byte chunks. [`LineSplitter`] reassembles
//! them into lines (a Devanagari character may straddle two chunks), and
//! [`decode_line`] turns one line into at most one [`StreamEvent`].

use super::types::StreamEvent;
use serde::Deserialize;
use std::collections::VecDeque;

/// Prefix marking a relevant line
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Payload that terminates the stream
pub const DONE_TOKEN: &str = "[DONE]";

/// Longest line kept before the rest of it is dropped
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Reassembles newline-delimited lines from byte chunks.
///
/// A line longer than the limit is cut at the limit and handed out as is
/// (so a `data:` payload decodes as malformed); the remainder up to the
/// next newline is discarded.
#[derive(Debug)]
pub struct LineSplitter {
    buf: Vec<u8>,
    max_line: usize,
    discarding: bool,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line: max_line.max(1),
            discarding: false,
        }
    }

    /// Append a chunk and move every completed line into `out`
    pub fn push(&mut self, chunk: &[u8], out: &mut VecDeque<Vec<u8>>) {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos);
            self.take(line, true, out);
            rest = &tail[1..];
        }
        self.take(rest, false, out);
    }

    fn take(&mut self, bytes: &[u8], complete: bool, out: &mut VecDeque<Vec<u8>>) {
        if self.discarding {
            self.discarding = !complete;
            return;
        }

        self.buf.extend_from_slice(bytes);
        let overflow = self.buf.len() > self.max_line;
        if overflow {
            tracing::warn!(max = self.max_line, "Stream line too long, truncating");
            self.buf.truncate(self.max_line);
        }
        if complete || overflow {
            let line = std::mem::take(&mut self.buf);
            out.push_back(strip_cr(&line).to_vec());
            self.discarding = overflow && !complete;
        }
    }

    /// Take an unterminated trailing line, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.discarding = false;
        if self.buf.is_empty() {
            None
        } else {
            let line = std::mem::take(&mut self.buf);
            Some(strip_cr(&line).to_vec())
        }
    }

    /// Bytes held back waiting for a newline
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[derive(Debug, Deserialize)]
struct DeltaChunk {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Decode one line. Lines without the `data: ` prefix yield nothing.
pub fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let Ok(text) = std::str::from_utf8(payload) else {
        return Some(StreamEvent::Malformed {
            raw: String::from_utf8_lossy(payload).into_owned(),
        });
    };
    Some(decode_payload(text))
}

/// Decode the text after `data: `
pub fn decode_payload(payload: &str) -> StreamEvent {
    let payload = payload.trim();
    if payload == DONE_TOKEN {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<DeltaChunk>(payload) {
        Ok(chunk) => {
            if let Some(error) = &chunk.error {
                tracing::warn!(error = %error, "Completion stream carried an error record");
            }
            let fragment = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .unwrap_or_default();
            StreamEvent::Delta { fragment }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable stream payload");
            StreamEvent::Malformed {
                raw: payload.to_string(),
            }
        }
    }
}
