//! Incremental byte-to-line decoding for streamed response bodies.

use std::char::REPLACEMENT_CHARACTER;

use futures::stream::{Stream, StreamExt};

use crate::error::ClientError;

/// Splits a chunked UTF-8 byte stream into text lines.
///
/// Multi-byte characters may straddle chunk boundaries: an incomplete
/// trailing sequence is held back until the next chunk completes it. Invalid
/// sequences decode to U+FFFD. Lines are split on `\n` with a single
/// preceding `\r` removed.
///
/// # Examples
///
/// ```
/// use streamchat_client::LineDecoder;
///
/// let mut decoder = LineDecoder::new();
/// assert!(decoder.feed(b"data: {\"a\"").is_empty());
/// assert_eq!(decoder.feed(b":1}\ndata: "), vec!["data: {\"a\":1}"]);
/// assert_eq!(decoder.finish().as_deref(), Some("data: "));
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes of an incomplete UTF-8 sequence from the previous chunk.
    pending: Vec<u8>,
    /// Decoded text after the last newline.
    buffer: String,
}

impl LineDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a chunk and returns every line it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.drain_lines()
    }

    /// Flushes the decoder at end of stream.
    ///
    /// Returns the unterminated remainder, or `None` if it is empty. A
    /// dangling partial character is flushed as U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.buffer.push(REPLACEMENT_CHARACTER);
        }
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    fn decode(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk
                            self.pending = tail.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let Some(last) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..last]
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }
}

/// Adapts a stream of byte chunks into a stream of lines.
///
/// A chunk error is yielded once and ends the stream. The remainder after
/// the final newline is yielded when the byte stream ends.
pub fn decode_lines<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Into<ClientError> + Send,
{
    async_stream::stream! {
        let mut decoder = LineDecoder::new();
        futures::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    for line in decoder.feed(chunk.as_ref()) {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }
        }

        if let Some(line) = decoder.finish() {
            yield Ok(line);
        }
    }
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    fn decode_chunked(bytes: &[u8], cuts: &[usize]) -> Vec<String> {
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            let cut = cut.clamp(start, bytes.len());
            lines.extend(decoder.feed(&bytes[start..cut]));
            start = cut;
        }
        lines.extend(decoder.feed(&bytes[start..]));
        lines.extend(decoder.finish());
        lines
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_lines(
            text in "([a-z\u{e9}\u{4e2d}\u{1f980} :{}\"]{0,12}\r?\n){0,8}[a-z\u{1f980}]{0,6}",
            mut cuts in prop::collection::vec(0usize..256, 0..12),
        ) {
            cuts.sort_unstable();
            let bytes = text.as_bytes();
            let whole = decode_chunked(bytes, &[]);
            prop_assert_eq!(decode_chunked(bytes, &cuts), whole);
        }

        #[test]
        fn chunking_invalid_bytes_does_not_change_lines(
            bytes in prop::collection::vec(any::<u8>(), 0..128),
            mut cuts in prop::collection::vec(0usize..128, 0..8),
        ) {
            cuts.sort_unstable();
            let whole = decode_chunked(&bytes, &[]);
            prop_assert_eq!(decode_chunked(&bytes, &cuts), whole);
        }
    }
}
