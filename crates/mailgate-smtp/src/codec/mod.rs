//! Byte-level codecs for the SMTP stream.

mod transparency;
mod utf8;

pub use transparency::{DATA_TERMINATOR, TransparencyCodec};
pub use utf8::{Utf8Reader, sequence_len};

/// Failure to decode the incoming byte stream as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Byte cannot start a UTF-8 sequence (`10xxxxxx` or `11111xxx`).
    #[error("illegal leading byte 0x{0:02X} for a UTF-8 character")]
    InvalidLeadByte(u8),

    /// Byte after the first in a sequence does not start with bits `10`.
    #[error("wrong continuation byte 0x{0:02X}, bytes after the first in a UTF-8 character must start with bits 10")]
    InvalidContinuation(u8),

    /// Stream ended inside a multi-byte sequence.
    #[error("unexpected end of stream inside a UTF-8 character")]
    UnexpectedEof,

    /// Well-framed sequence that is not valid UTF-8 (overlong, surrogate, out of range).
    #[error("invalid UTF-8 sequence")]
    InvalidSequence,
}
