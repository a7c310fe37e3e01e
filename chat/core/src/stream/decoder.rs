//! Incremental UTF-8 decoding
//!
//! Chunk boundaries on the wire have nothing to do with character
//! boundaries. The decoder keeps the trailing bytes of an unfinished
//! multi-byte sequence and prepends them to the next chunk.

use futures::stream::{self, Stream, StreamExt};

use crate::error::DecodeError;

/// Stateful UTF-8 decoder for one response stream
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Bytes of an incomplete trailing sequence
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Create a decoder with an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes held back waiting for the rest of a character
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode one chunk
    ///
    /// Returns all text that is complete so far. Invalid sequences become
    /// U+FFFD; an incomplete sequence at the end of the chunk is buffered.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut offset = 0;

        while offset < self.pending.len() {
            match std::str::from_utf8(&self.pending[offset..]) {
                Ok(text) => {
                    out.push_str(text);
                    offset = self.pending.len();
                }
                Err(e) => {
                    let valid_up_to = offset + e.valid_up_to();
                    // Validated by from_utf8 up to valid_up_to
                    out.push_str(&String::from_utf8_lossy(&self.pending[offset..valid_up_to]));

                    match e.error_len() {
                        // Incomplete sequence at the end; keep it for the next chunk
                        None => {
                            offset = valid_up_to;
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            offset = valid_up_to + len;
                        }
                    }
                }
            }
        }

        self.pending.drain(..offset);
        out
    }

    /// Close the decoder at end of stream
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::IncompleteTail`] if bytes of an unfinished
    /// character were still buffered. They are dropped either way.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::IncompleteTail {
                bytes: self.pending.len(),
            })
        }
    }
}

/// Turn a stream of byte chunks into a stream of text fragments
///
/// The returned stream is lazy and ends with the input. Chunks that only
/// extend a buffered partial character produce no fragment. The first
/// error from the input is yielded and ends the stream.
pub fn decode_utf8<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    stream::unfold(
        Some((chunks, Utf8StreamDecoder::new())),
        |state| async move {
            let Some((mut chunks, mut decoder)) = state else {
                return None;
            };
            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.decode(chunk.as_ref());
                        if !text.is_empty() {
                            return Some((Ok(text), Some((chunks, decoder))));
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        if let Err(e) = decoder.finish() {
                            tracing::debug!(error = %e, "Dropped incomplete UTF-8 tail");
                        }
                        return None;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"A fever is "), "A fever is ");
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.finish(), Ok(()));
    }

    #[test]
    fn test_three_byte_char_split_two_then_one() {
        // U+20AC EURO SIGN = E2 82 AC
        let euro = "€".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();

        assert_eq!(decoder.decode(&[b'a', euro[0], euro[1]]), "a");
        assert_eq!(decoder.pending_len(), 2);
        assert_eq!(decoder.decode(&[euro[2], b'b']), "€b");
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.finish(), Ok(()));
    }

    #[test]
    fn test_four_byte_char_one_byte_at_a_time() {
        let bytes = "🩺".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, "🩺");
    }

    #[test]
    fn test_invalid_byte_is_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ok\xFFgo"), "ok\u{FFFD}go");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_incomplete_tail_dropped_on_finish() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(
            decoder.finish(),
            Err(DecodeError::IncompleteTail { bytes: 2 })
        );
    }

    #[tokio::test]
    async fn test_decode_utf8_stream() {
        let euro = "€".as_bytes();
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"price: ".to_vec()),
            Ok(vec![euro[0], euro[1]]),
            Ok(vec![euro[2]]),
            Ok(vec![0xE2]),
        ];

        let fragments: Vec<_> = decode_utf8(stream::iter(chunks)).collect().await;
        assert_eq!(
            fragments,
            vec![Ok("price: ".to_string()), Ok("€".to_string())]
        );
    }

    #[tokio::test]
    async fn test_decode_utf8_stops_at_first_error() {
        let chunks: Vec<Result<Vec<u8>, &str>> =
            vec![Ok(b"one".to_vec()), Err("reset"), Ok(b"two".to_vec())];

        let fragments: Vec<_> = decode_utf8(stream::iter(chunks)).collect().await;
        assert_eq!(fragments, vec![Ok("one".to_string()), Err("reset")]);
    }
}
