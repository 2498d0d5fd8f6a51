//! Frame reassembly: turns decoded text into complete logical frames.
//!
//! - `sse`: blocks separated by a blank line (`\n\n`)
//! - `ndjson`: one frame per line
//! - `text` / `unknown`: no framing, text is handed on as it arrives
//!
//! Anything that does not yet form a complete frame stays buffered until
//! more text arrives or [`FrameParser::finish`] is called.

use tracing::debug;

use crate::format::WireFormat;

/// Legacy marker a plain-text server writes before an error message.
pub const STREAM_ERROR_SENTINEL: &str = "[stream-error]";

/// One complete unit of wire data, not yet interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An SSE event payload or NDJSON line, trimmed and non-empty.
    Record(String),
    /// Progressive raw text from an unframed body.
    Text(String),
    /// What remains of an unframed body at stream end. May carry the
    /// error sentinel and its message.
    TextTail(String),
}

/// Format-specific splitter over the growing text buffer.
#[derive(Debug)]
pub struct FrameParser {
    format: WireFormat,
    buffer: String,
    /// Set once an unframed body has produced the error sentinel; everything
    /// after it is the error message and is held for the final flush.
    sentinel_seen: bool,
}

impl FrameParser {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            buffer: String::new(),
            sentinel_seen: false,
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Bytes of text currently held back.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append decoded text and return every frame it completes.
    pub fn push(&mut self, text: &str) -> Vec<Frame> {
        self.buffer.push_str(text);
        match self.format {
            WireFormat::Sse => {
                self.normalize_line_endings();
                self.drain_separated("\n\n")
                    .into_iter()
                    .filter_map(|block| sse_payload(&block).map(Frame::Record))
                    .collect()
            }
            WireFormat::Ndjson => self
                .drain_separated("\n")
                .into_iter()
                .map(Frame::Record)
                .collect(),
            WireFormat::Text | WireFormat::Unknown => self.drain_text(),
        }
    }

    /// Flush the remainder at stream end.
    pub fn finish(&mut self) -> Vec<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        match self.format {
            WireFormat::Sse => {
                let block = rest.trim();
                if block.is_empty() {
                    return Vec::new();
                }
                sse_payload(block).map(Frame::Record).into_iter().collect()
            }
            WireFormat::Ndjson => {
                let line = rest.trim();
                if line.is_empty() {
                    Vec::new()
                } else {
                    vec![Frame::Record(line.to_string())]
                }
            }
            WireFormat::Text | WireFormat::Unknown => {
                if rest.is_empty() {
                    Vec::new()
                } else {
                    vec![Frame::TextTail(rest)]
                }
            }
        }
    }

    /// SSE lines may end in CRLF. The whole pending buffer is rewritten so a
    /// `\r` and `\n` split across two chunks are still joined.
    fn normalize_line_endings(&mut self) {
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    /// Split off every complete segment ending in `separator`. Segments are
    /// trimmed and empty ones are dropped; the unterminated tail stays.
    fn drain_separated(&mut self, separator: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..].find(separator) {
            let end = consumed + offset;
            let segment = self.buffer[consumed..end].trim();
            if !segment.is_empty() {
                segments.push(segment.to_string());
            }
            consumed = end + separator.len();
        }

        self.buffer.drain(..consumed);
        segments
    }

    fn drain_text(&mut self) -> Vec<Frame> {
        if self.sentinel_seen {
            return Vec::new();
        }

        if let Some(pos) = self.buffer.find(STREAM_ERROR_SENTINEL) {
            debug!("error sentinel found in text stream");
            self.sentinel_seen = true;
            let before: String = self.buffer.drain(..pos).collect();
            return if before.is_empty() {
                Vec::new()
            } else {
                vec![Frame::Text(before)]
            };
        }

        // Hold back a suffix that could be the start of a split sentinel
        let emit_to = self.buffer.len() - partial_sentinel_len(&self.buffer);
        if emit_to == 0 {
            return Vec::new();
        }
        vec![Frame::Text(self.buffer.drain(..emit_to).collect())]
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the
/// sentinel. The sentinel is ASCII, so the cut is always a char boundary.
fn partial_sentinel_len(text: &str) -> usize {
    (1..STREAM_ERROR_SENTINEL.len())
        .rev()
        .find(|&n| text.ends_with(&STREAM_ERROR_SENTINEL[..n]))
        .unwrap_or(0)
}

/// Payload of one SSE block.
///
/// Blocks written with field lines (`data:`, `event:`, `id:`, `retry:`,
/// `:` comments) yield their joined `data:` values, or `None` when there is
/// no data at all (keep-alives). A block without field syntax is the payload
/// itself.
fn sse_payload(block: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        } else if !is_sse_field(line) {
            return Some(block.to_string());
        }
    }

    let payload = data.join("\n");
    let payload = payload.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

fn is_sse_field(line: &str) -> bool {
    line.starts_with(':')
        || line.starts_with("event:")
        || line.starts_with("id:")
        || line.starts_with("retry:")
}
