//! Incremental UTF-8 decoding of a byte stream.
//!
//! Network chunk boundaries do not respect character boundaries, so a
//! multi-byte sequence split across two reads is carried over to the next
//! call. Invalid bytes decode to U+FFFD, as a non-fatal text decoder would.

#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut d = Utf8ChunkDecoder::new();
        assert_eq!(d.decode(b"{\"a\":"), "{\"a\":");
        assert_eq!(d.decode(b"1}"), "1}");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn split_multibyte_is_carried_over() {
        let bytes = "é€".as_bytes();
        let mut d = Utf8ChunkDecoder::new();
        assert_eq!(d.decode(&bytes[..1]), "");
        assert_eq!(d.decode(&bytes[1..3]), "é");
        assert_eq!(d.decode(&bytes[3..]), "€");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut d = Utf8ChunkDecoder::new();
        assert_eq!(d.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn truncated_tail_is_flushed_lossily() {
        let mut d = Utf8ChunkDecoder::new();
        assert_eq!(d.decode(&"€".as_bytes()[..2]), "");
        assert_eq!(d.finish(), "\u{FFFD}");
    }
}
