//! UTF-8 decoding and line splitting of output chunks.
//!
//! Chunks come from snapshot reads, so they can end in the middle of a
//! multi-byte character or a line. An incomplete character at the end of a
//! chunk is carried into the next one. Bytes that can never form valid UTF-8
//! produce an [`ExecError::OutputDecodingFailed`] and are replaced with
//! U+FFFD so the rest of the chunk is still captured.

use bytes::BytesMut;

use crate::config::LineBuffering;
use crate::error::ExecError;

/// Lines decoded from one chunk, plus the decode failure if there was one.
#[derive(Debug, Default)]
pub struct DecodedChunk {
    /// Complete lines, without terminators.
    pub lines: Vec<String>,
    /// The first invalid sequence in the chunk, if any.
    pub error: Option<ExecError>,
}

impl DecodedChunk {
    /// Check whether the chunk produced neither lines nor an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.error.is_none()
    }
}

/// Stateful decoder turning output chunks into lines.
#[derive(Debug)]
pub struct LineDecoder {
    buffering: LineBuffering,
    /// Incomplete UTF-8 sequence left over from the previous chunk.
    pending_bytes: BytesMut,
    /// Unterminated line held back in [`LineBuffering::Buffered`] mode.
    partial_line: String,
}

impl LineDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new(buffering: LineBuffering) -> Self {
        Self {
            buffering,
            pending_bytes: BytesMut::new(),
            partial_line: String::new(),
        }
    }

    /// Get the line buffering mode.
    #[must_use]
    pub const fn buffering(&self) -> LineBuffering {
        self.buffering
    }

    /// Check whether bytes or text are being held back.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending_bytes.is_empty() || !self.partial_line.is_empty()
    }

    /// The unterminated line held back in [`LineBuffering::Buffered`] mode.
    #[must_use]
    pub fn partial_line(&self) -> &str {
        &self.partial_line
    }

    /// Decode a chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> DecodedChunk {
        self.pending_bytes.extend_from_slice(chunk);
        let complete = complete_len(&self.pending_bytes);
        let bytes = self.pending_bytes.split_to(complete);

        let (text, error) = decode_lossy(&bytes);
        DecodedChunk {
            lines: self.split_lines(&text),
            error,
        }
    }

    /// Flush everything held back, at end of stream.
    ///
    /// A leftover incomplete character is reported as a decode failure.
    pub fn finish(&mut self) -> DecodedChunk {
        let bytes = self.pending_bytes.split();
        let (text, error) = decode_lossy(&bytes);

        let mut lines = self.split_lines(&text);
        let partial = std::mem::take(&mut self.partial_line);
        lines.extend(partial.lines().map(str::to_string));
        DecodedChunk { lines, error }
    }

    fn split_lines(&mut self, text: &str) -> Vec<String> {
        match self.buffering {
            LineBuffering::Immediate => text.lines().map(str::to_string).collect(),
            LineBuffering::Buffered => {
                if text.is_empty() {
                    return Vec::new();
                }
                self.partial_line.push_str(text);

                let Some(last_newline) = self.partial_line.rfind('\n') else {
                    return Vec::new();
                };
                let rest = self.partial_line.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.partial_line, rest);
                complete.lines().map(str::to_string).collect()
            }
        }
    }
}

/// Length of the prefix of `bytes` that does not end in an incomplete
/// character. Invalid sequences count as complete.
fn complete_len(bytes: &[u8]) -> usize {
    let mut start = 0;
    loop {
        match std::str::from_utf8(&bytes[start..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                Some(len) => start += e.valid_up_to() + len,
                None => return start + e.valid_up_to(),
            },
        }
    }
}

fn decode_lossy(bytes: &[u8]) -> (String, Option<ExecError>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(e) => (
            String::from_utf8_lossy(bytes).into_owned(),
            Some(ExecError::decoding(&e)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_emits_partial_chunks() {
        let mut decoder = LineDecoder::new(LineBuffering::Immediate);
        assert_eq!(decoder.decode(b"Hello Wo").lines, vec!["Hello Wo"]);
        assert_eq!(decoder.decode(b"rld\nnext\n").lines, vec!["rld", "next"]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn buffered_reconstructs_lines() {
        let mut decoder = LineDecoder::new(LineBuffering::Buffered);
        assert!(decoder.decode(b"Hello Wo").lines.is_empty());
        assert_eq!(decoder.decode(b"rld\nnext").lines, vec!["Hello World"]);
        assert!(decoder.has_pending());
        assert_eq!(decoder.partial_line(), "next");
        assert_eq!(decoder.finish().lines, vec!["next"]);
        assert!(decoder.partial_line().is_empty());
    }

    #[test]
    fn crlf_is_stripped() {
        let mut decoder = LineDecoder::new(LineBuffering::Immediate);
        assert_eq!(decoder.decode(b"one\r\ntwo\r\n").lines, vec!["one", "two"]);
    }

    #[test]
    fn empty_lines_are_kept() {
        let mut decoder = LineDecoder::new(LineBuffering::Immediate);
        assert_eq!(decoder.decode(b"a\n\nb\n").lines, vec!["a", "", "b"]);
    }

    #[test]
    fn split_character_is_carried() {
        let mut decoder = LineDecoder::new(LineBuffering::Immediate);
        let bytes = "é\n".as_bytes();

        let first = decoder.decode(&bytes[..1]);
        assert!(first.is_empty());
        assert!(decoder.has_pending());

        let second = decoder.decode(&bytes[1..]);
        assert!(second.error.is_none());
        assert_eq!(second.lines, vec!["é"]);
    }

    #[test]
    fn invalid_bytes_are_replaced_and_reported() {
        let mut decoder = LineDecoder::new(LineBuffering::Immediate);
        let decoded = decoder.decode(b"ok\n\xff\xfebad\nafter\n");

        assert!(decoded.error.as_ref().is_some_and(ExecError::is_decoding));
        assert_eq!(decoded.lines, vec!["ok", "\u{FFFD}\u{FFFD}bad", "after"]);
    }

    #[test]
    fn incomplete_character_at_end_of_stream_is_an_error() {
        let mut decoder = LineDecoder::new(LineBuffering::Immediate);
        assert!(decoder.decode(&[b'x', 0xe2, 0x82]).error.is_none());

        let finished = decoder.finish();
        assert!(finished.error.is_some());
        assert_eq!(finished.lines, vec!["\u{FFFD}"]);
    }

    #[test]
    fn complete_len_stops_before_incomplete_tail() {
        assert_eq!(complete_len(b"abc"), 3);
        assert_eq!(complete_len(&[b'a', 0xe2, 0x82]), 1);
        assert_eq!(complete_len(&[0xff, b'a']), 2);
        assert_eq!(complete_len(&[0xff, 0xe2]), 1);
    }
}
