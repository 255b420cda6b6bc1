//! Server-side session state consumed by command handlers.

use std::fmt;
use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::Result;
use crate::handler::MessageHandler;

/// Per-session limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum recipients per transaction. `None` means unlimited.
    pub max_recipients: Option<usize>,
}

impl SessionConfig {
    /// Limits each transaction to `max` recipients.
    #[must_use]
    pub const fn with_max_recipients(mut self, max: usize) -> Self {
        self.max_recipients = Some(max);
        self
    }
}

/// One client connection as seen by the command handlers.
pub struct Session<W> {
    writer: W,
    peer: SocketAddr,
    config: SessionConfig,
    mail_from: Option<String>,
    recipients: Vec<String>,
    handler: Box<dyn MessageHandler>,
}

impl<W> Session<W> {
    /// Creates a session writing replies to `writer`.
    pub fn new(
        writer: W,
        peer: SocketAddr,
        config: SessionConfig,
        handler: Box<dyn MessageHandler>,
    ) -> Self {
        Self {
            writer,
            peer,
            config,
            mail_from: None,
            recipients: Vec::new(),
            handler,
        }
    }

    /// Remote address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Session limits.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The reply writer.
    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Handler for the current transaction.
    pub fn message_handler(&mut self) -> &mut dyn MessageHandler {
        self.handler.as_mut()
    }

    /// Sender of the open transaction.
    #[must_use]
    pub fn mail_from(&self) -> Option<&str> {
        self.mail_from.as_deref()
    }

    /// Returns true between an accepted MAIL and the end of the transaction.
    #[must_use]
    pub const fn is_mail_transaction_in_progress(&self) -> bool {
        self.mail_from.is_some()
    }

    /// Opens a transaction for `from`.
    pub fn start_mail_transaction(&mut self, from: impl Into<String>) {
        self.mail_from = Some(from.into());
        self.recipients.clear();
    }

    /// Closes the open transaction, if any, and tells the handler.
    pub fn reset_mail_transaction(&mut self) {
        if self.mail_from.take().is_some() {
            self.handler.done();
        }
        self.recipients.clear();
    }

    /// Records an accepted recipient.
    pub fn add_recipient(&mut self, recipient: impl Into<String>) {
        self.recipients.push(recipient.into());
    }

    /// Recipients accepted in the open transaction.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Number of recipients accepted in the open transaction.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}

impl<W: AsyncWrite + Unpin> Session<W> {
    /// Writes one reply line, appending CRLF, and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the write fails.
    pub async fn send_response(&mut self, response: &str) -> Result<()> {
        debug!(peer = %self.peer, "S: {response}");
        self.writer.write_all(response.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<W> fmt::Debug for Session<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("config", &self.config)
            .field("mail_from", &self.mail_from)
            .field("recipients", &self.recipients)
            .finish_non_exhaustive()
    }
}
