//! Incremental output decoding
//!
//! Converts raw bytes from the child process into text. Output arrives in
//! arbitrary chunks, so a multi-byte UTF-8 sequence can be split across two
//! reads; the decoder buffers the incomplete tail until the rest shows up.

/// Incremental UTF-8 decoder for one output channel.
///
/// Undecodable bytes are replaced with U+FFFD rather than failing the
/// stream. Bytes are never lost or duplicated across chunk boundaries.
pub struct OutputDecoder {
    /// Incomplete trailing sequence from the previous chunk (at most 3 bytes).
    pending: Vec<u8>,
}

impl Default for OutputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(4),
        }
    }

    /// Decode a chunk of bytes, carrying partial sequences across calls.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        if self.pending.is_empty() {
            return Self::decode_inner(bytes, &mut self.pending);
        }

        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);
        Self::decode_inner(&input, &mut self.pending)
    }

    /// Flush any buffered partial sequence as a replacement character.
    ///
    /// Call once at end of stream; a dangling partial sequence at that point
    /// can never complete.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            "\u{FFFD}".to_string()
        }
    }

    fn decode_inner(data: &[u8], pending: &mut Vec<u8>) -> String {
        let mut out = String::with_capacity(data.len());
        let mut rest = data;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // The prefix up to valid_up_to() is well-formed UTF-8
                    out.push_str(unsafe { std::str::from_utf8_unchecked(&rest[..valid]) });

                    match e.error_len() {
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            rest = &rest[valid + bad..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk;
                            // hold it for the next call
                            pending.extend_from_slice(&rest[valid..]);
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut dec = OutputDecoder::new();
        assert_eq!(dec.decode(b"hello world\n"), "hello world\n");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        // "héllo" with the two-byte é split between chunks
        let mut dec = OutputDecoder::new();
        let mut out = dec.decode(b"h\xc3");
        assert_eq!(out, "h");
        out.push_str(&dec.decode(b"\xa9llo"));
        assert_eq!(out, "héllo");
    }

    #[test]
    fn test_four_byte_split_three_ways() {
        // U+1F600 😀 = F0 9F 98 80, delivered one byte at a time
        let mut dec = OutputDecoder::new();
        let mut out = String::new();
        for b in [0xF0u8, 0x9F, 0x98, 0x80] {
            out.push_str(&dec.decode(&[b]));
        }
        assert_eq!(out, "😀");
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut dec = OutputDecoder::new();
        assert_eq!(dec.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_invalid_continuation_replaced() {
        // 0xC3 followed by a non-continuation byte is an error, not a hold
        let mut dec = OutputDecoder::new();
        assert_eq!(dec.decode(b"\xc3x"), "\u{FFFD}x");
    }

    #[test]
    fn test_no_loss_or_duplication_across_boundaries() {
        let text = "日本語テキスト mixed with ascii";
        let bytes = text.as_bytes();

        // Every possible split point must reassemble to the same text
        for split in 0..=bytes.len() {
            let mut dec = OutputDecoder::new();
            let mut out = dec.decode(&bytes[..split]);
            out.push_str(&dec.decode(&bytes[split..]));
            out.push_str(&dec.finish());
            assert_eq!(out, text, "split at {}", split);
        }
    }

    #[test]
    fn test_finish_flushes_dangling_partial() {
        let mut dec = OutputDecoder::new();
        assert_eq!(dec.decode(b"ok\xe3\x81"), "ok");
        assert_eq!(dec.finish(), "\u{FFFD}");
        assert_eq!(dec.finish(), "");
    }
}
