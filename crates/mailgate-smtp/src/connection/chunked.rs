//! BDAT chunked transfer (RFC 3030 CHUNKING).
//!
//! Each chunk is announced as `BDAT <size> [LAST]` and followed by exactly
//! `size` raw bytes. Content is length-delimited, so it is never dot-stuffed.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{Exchange, ReplyChannel};
use crate::command::Command;
use crate::error::Result;
use crate::types::Reply;

impl<S> ReplyChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends one BDAT chunk and flushes it, without reading the reply.
    ///
    /// The announced size is the byte length of `chunk`, so multi-byte text
    /// is counted correctly.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or a write fails.
    pub async fn send_chunk(&mut self, chunk: &[u8], last: bool) -> Result<()> {
        let command = Command::Bdat {
            size: chunk.len(),
            last,
        };
        self.send(&command.to_string()).await?;
        self.write_raw(chunk).await?;
        self.flush().await
    }
}

impl<S> Exchange<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends one BDAT chunk and requires a positive reply for it.
    ///
    /// The reply goes through the same 421 check as every other reply of
    /// the session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rejected`] if the server refuses the chunk,
    /// plus the errors of [`ReplyChannel::send_chunk`] and
    /// [`receive`](Self::receive).
    pub async fn bdat(&mut self, chunk: impl AsRef<[u8]>, last: bool) -> Result<Reply> {
        let chunk = chunk.as_ref();
        self.channel.send_chunk(chunk, last).await?;
        debug!(size = chunk.len(), last, "BDAT chunk sent");
        self.receive_and_check().await
    }

    /// Sends the final BDAT chunk of a message.
    ///
    /// # Errors
    ///
    /// See [`bdat`](Self::bdat).
    pub async fn bdat_last(&mut self, chunk: impl AsRef<[u8]>) -> Result<Reply> {
        self.bdat(chunk, true).await
    }
}
