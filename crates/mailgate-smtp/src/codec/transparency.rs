//! DATA transparency (RFC 5321 section 4.5.2).
//!
//! Content lines that begin with `.` get a second `.` so the receiver's
//! "a line holding a single dot ends the message" rule cannot fire early.
//! When the content is complete, the codec makes sure the stream sits at the
//! start of a line and appends the `.` CRLF terminator.

use bytes::{BufMut, BytesMut};

const CRLF: [u8; 2] = *b"\r\n";

/// Terminator line that ends the DATA phase.
pub const DATA_TERMINATOR: &[u8] = b".\r\n";

/// Dot-stuffing encoder with terminating-sequence support.
///
/// State carries across calls to [`encode`](Self::encode), so content may be
/// fed in arbitrary slices, including slices that split a CRLF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransparencyCodec {
    /// Last two content bytes seen. Starts as CRLF: the 354 reply leaves the
    /// client at the start of a line.
    tail: [u8; 2],
}

impl Default for TransparencyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TransparencyCodec {
    /// Creates a codec positioned at the start of a line.
    #[must_use]
    pub const fn new() -> Self {
        Self { tail: CRLF }
    }

    /// Returns true if the next content byte starts a new line.
    #[must_use]
    pub fn at_line_start(&self) -> bool {
        self.tail == CRLF
    }

    /// Dot-stuffs `input` into `out`.
    pub fn encode(&mut self, input: &[u8], out: &mut BytesMut) {
        out.reserve(input.len());
        let mut start = 0;
        for (i, &byte) in input.iter().enumerate() {
            if byte == b'.' && self.at_line_start() {
                out.extend_from_slice(&input[start..i]);
                out.put_u8(b'.');
                start = i;
            }
            self.tail = [self.tail[1], byte];
        }
        out.extend_from_slice(&input[start..]);
    }

    /// Writes the terminating sequence into `out`.
    ///
    /// A CRLF is synthesized first when the content did not end with one.
    /// Afterwards the codec is ready for the next message.
    pub fn finish(&mut self, out: &mut BytesMut) {
        if !self.at_line_start() {
            out.extend_from_slice(&CRLF);
        }
        out.extend_from_slice(DATA_TERMINATOR);
        self.tail = CRLF;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_all(parts: &[&[u8]]) -> Vec<u8> {
        let mut codec = TransparencyCodec::new();
        let mut out = BytesMut::new();
        for part in parts {
            codec.encode(part, &mut out);
        }
        codec.finish(&mut out);
        out.to_vec()
    }

    #[test]
    fn test_leading_dot_on_first_line() {
        assert_eq!(encode_all(&[b".lonedot\r\n"]), b"..lonedot\r\n.\r\n");
    }

    #[test]
    fn test_leading_dot_after_crlf() {
        assert_eq!(
            encode_all(&[b"Subject: x\r\n\r\n.hidden\r\nend\r\n"]),
            b"Subject: x\r\n\r\n..hidden\r\nend\r\n.\r\n"
        );
    }

    #[test]
    fn test_lone_dot_line_in_content() {
        assert_eq!(encode_all(&[b"a\r\n.\r\nb\r\n"]), b"a\r\n..\r\nb\r\n.\r\n");
    }

    #[test]
    fn test_dot_not_at_line_start_untouched() {
        assert_eq!(encode_all(&[b"a.b\r\n"]), b"a.b\r\n.\r\n");
    }

    #[test]
    fn test_bare_lf_is_not_a_line_break() {
        assert_eq!(encode_all(&[b"a\n.b\r\n"]), b"a\n.b\r\n.\r\n");
    }

    #[test]
    fn test_state_survives_split_writes() {
        assert_eq!(encode_all(&[b"a\r", b"\n", b".b"]), b"a\r\n..b\r\n.\r\n");
    }

    #[test]
    fn test_crlf_synthesized_before_terminator() {
        assert_eq!(encode_all(&[b"no newline"]), b"no newline\r\n.\r\n");
        assert_eq!(encode_all(&[b"half\r"]), b"half\r\r\n.\r\n");
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(encode_all(&[]), b".\r\n");
    }

    #[test]
    fn test_finish_resets_for_next_message() {
        let mut codec = TransparencyCodec::new();
        let mut out = BytesMut::new();
        codec.encode(b"x", &mut out);
        codec.finish(&mut out);
        assert!(codec.at_line_start());
        codec.encode(b".y", &mut out);
        assert_eq!(&out[..], b"x\r\n.\r\n..y");
    }

    proptest! {
        #[test]
        fn only_the_terminator_ends_the_message(content in proptest::collection::vec(
            prop_oneof![Just(b'.'), Just(b'\r'), Just(b'\n'), any::<u8>()], 0..64)
        ) {
            let encoded = encode_all(&[&content]);
            let mut framed = b"\r\n".to_vec();
            framed.extend_from_slice(&encoded);
            let first = framed.windows(5).position(|w| w == b"\r\n.\r\n");
            prop_assert_eq!(first, Some(framed.len() - 5));
        }
    }
}
