//! Streaming UTF-8 decoder that never reads ahead.
//!
//! A buffered reader fills its buffer in blocks, so bytes belonging to the
//! next protocol phase (message content following a reply, a command
//! following a banner) end up stranded in a buffer nobody else can see.
//! [`Utf8Reader`] pulls exactly the bytes of one character per call and
//! leaves everything after it in the underlying stream.
//!
//! Output is UTF-16 code units. Characters outside the basic multilingual
//! plane decode to a surrogate pair: the high surrogate is returned first and
//! the low one is handed out by the next call without touching the stream.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::DecodeError;
use crate::error::Result;

/// Unbuffered UTF-8 reader producing UTF-16 code units.
#[derive(Debug)]
pub struct Utf8Reader<R> {
    inner: R,
    pending: Option<u16>,
}

impl<R> Utf8Reader<R> {
    /// Wraps a byte source.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            pending: None,
        }
    }

    /// Gets a reference to the underlying source.
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Gets a mutable reference to the underlying source.
    ///
    /// Reading from it directly while a low surrogate is pending skips that
    /// surrogate.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Returns true if a low surrogate is waiting to be returned.
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consumes the reader and returns the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> Utf8Reader<R> {
    /// Reads one UTF-16 code unit.
    ///
    /// Returns `Ok(None)` on a clean end of stream, i.e. one that happens
    /// before the first byte of a new character.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] (wrapped in [`crate::Error::Decode`]) for an
    /// invalid leading byte, an invalid continuation byte, an encoding the
    /// standard decoder rejects, or an end of stream inside a character.
    pub async fn read_unit(&mut self) -> Result<Option<u16>> {
        if let Some(unit) = self.pending.take() {
            return Ok(Some(unit));
        }

        let Some(lead) = self.read_byte().await? else {
            return Ok(None);
        };

        let len = sequence_len(lead)?;
        if len == 1 {
            return Ok(Some(u16::from(lead)));
        }

        let mut bytes = [lead, 0, 0, 0];
        for slot in &mut bytes[1..len] {
            let byte = self
                .read_byte()
                .await?
                .ok_or(DecodeError::UnexpectedEof)?;
            if !is_continuation(byte) {
                return Err(DecodeError::InvalidContinuation(byte).into());
            }
            *slot = byte;
        }

        let ch = std::str::from_utf8(&bytes[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(DecodeError::InvalidSequence)?;

        let mut units = [0u16; 2];
        let encoded = ch.encode_utf16(&mut units);
        if let [_, low] = encoded {
            self.pending = Some(*low);
        }
        Ok(Some(encoded[0]))
    }

    /// Fills `buf` with code units.
    ///
    /// Returns the number of units written, or `Ok(None)` if the stream
    /// ended before a single unit could be produced.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Self::read_unit`].
    pub async fn read(&mut self, buf: &mut [u16]) -> Result<Option<usize>> {
        for (filled, slot) in buf.iter_mut().enumerate() {
            match self.read_unit().await? {
                Some(unit) => *slot = unit,
                None if filled == 0 => return Ok(None),
                None => return Ok(Some(filled)),
            }
        }
        Ok(Some(buf.len()))
    }

    async fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte).await {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: AsyncWrite + Unpin> Utf8Reader<R> {
    /// Shuts down the underlying stream.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the underlying stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Returns the total byte length of the sequence introduced by `lead`.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLeadByte`] for continuation bytes
/// (`10xxxxxx`) and for five or more leading ones (`11111xxx`).
pub const fn sequence_len(lead: u8) -> std::result::Result<usize, DecodeError> {
    match lead.leading_ones() {
        0 => Ok(1),
        2 => Ok(2),
        3 => Ok(3),
        4 => Ok(4),
        _ => Err(DecodeError::InvalidLeadByte(lead)),
    }
}

const fn is_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}
