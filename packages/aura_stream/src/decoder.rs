//! Incremental UTF-8 decoding of response body chunks.

/// Streaming UTF-8 decoder that carries an incomplete multi-byte sequence
/// from one chunk into the next, so a character split across two network
/// reads is decoded once both halves have arrived.
#[derive(Debug, Default)]
pub struct ByteDecoder {
    pending: Vec<u8>,
}

impl ByteDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return all text that is complete so far.
    ///
    /// A trailing incomplete sequence is retained for the next call.
    /// Bytes that can never form valid UTF-8 are replaced with U+FFFD.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut text = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    // Borrowed, no replacement: the prefix was validated above
                    text.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));

                    match e.error_len() {
                        None => {
                            // Incomplete sequence at the end, wait for its continuation
                            consumed += valid_up_to;
                            break;
                        }
                        Some(len) => {
                            text.push('\u{FFFD}');
                            consumed += valid_up_to + len;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        text
    }

    /// Drain whatever is still buffered at end of stream.
    ///
    /// An unfinished sequence is an acceptable lossy ending and comes out as
    /// U+FFFD rather than being dropped.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }

    /// True while part of a multi-byte sequence is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
