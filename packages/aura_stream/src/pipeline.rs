//! Byte decoding, framing and classification chained for one session.

use tracing::debug;

use crate::classify::classify;
use crate::decoder::ByteDecoder;
use crate::event::StreamEvent;
use crate::format::WireFormat;
use crate::frame::FrameParser;

/// Turns raw body chunks into classified events. Synchronous; the caller
/// owns the reading and the throttling.
#[derive(Debug)]
pub struct StreamDecoder {
    bytes: ByteDecoder,
    frames: FrameParser,
}

impl StreamDecoder {
    pub fn new(format: WireFormat) -> Self {
        Self {
            bytes: ByteDecoder::new(),
            frames: FrameParser::new(format),
        }
    }

    pub fn for_content_type(content_type: Option<&str>) -> Self {
        let format = WireFormat::from_content_type(content_type);
        debug!(content_type = ?content_type, %format, "wire format selected");
        Self::new(format)
    }

    pub fn format(&self) -> WireFormat {
        self.frames.format()
    }

    /// Feed one chunk and return the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.bytes.decode(chunk);
        if text.is_empty() {
            return Vec::new();
        }
        self.frames.push(&text).into_iter().flat_map(classify).collect()
    }

    /// Flush everything still held at stream end.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let tail = self.bytes.finish();
        let mut frames = if tail.is_empty() {
            Vec::new()
        } else {
            self.frames.push(&tail)
        };
        frames.extend(self.frames.finish());
        frames.into_iter().flat_map(classify).collect()
    }
}
