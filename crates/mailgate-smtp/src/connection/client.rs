//! Client-side session driver.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::stream::check;
use super::{Authenticator, ClientConfig, NoAuthenticator, ReplyChannel};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{Address, Extensions, Reply, ReplyCode};

/// Where a session stands in the SMTP conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Transport open. [`SessionDriver::start`] reads the greeting from here.
    Connected,
    /// EHLO or HELO accepted; ready for MAIL.
    Negotiated,
    /// Authenticator completed; ready for MAIL.
    Authenticated,
    /// MAIL accepted; recipients may be added.
    InTransaction,
    /// DATA accepted; content may be written.
    DataPhase,
    /// At least one non-final BDAT chunk accepted.
    ChunkPhase,
    /// QUIT attempted and transport closed.
    Closed,
}

impl SessionState {
    /// True while the server is taking message content rather than
    /// commands.
    const fn in_content(self) -> bool {
        matches!(self, Self::DataPhase | Self::ChunkPhase)
    }
}

/// Per-connection envelope counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeState {
    recipient_count: usize,
    server_closing: bool,
}

impl EnvelopeState {
    /// Number of recipients the server accepted over the session.
    #[must_use]
    pub const fn recipient_count(&self) -> usize {
        self.recipient_count
    }

    /// True once the server replied 421.
    #[must_use]
    pub const fn server_closing(&self) -> bool {
        self.server_closing
    }

    fn observe(&mut self, reply: &Reply) {
        if reply.code == ReplyCode::SERVICE_UNAVAILABLE {
            self.server_closing = true;
        }
    }
}

/// Command/reply access handed to an [`Authenticator`].
///
/// Every reply read through an `Exchange` is inspected for 421, exactly like
/// the driver's own replies, so an authenticator cannot bypass the closing
/// rule.
pub struct Exchange<'a, S> {
    pub(super) channel: &'a mut ReplyChannel<S>,
    pub(super) envelope: &'a mut EnvelopeState,
    pub(super) extensions: &'a Extensions,
}

impl<S> Exchange<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Extensions advertised in the most recent EHLO reply.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        self.extensions
    }

    /// Sends one command line.
    ///
    /// # Errors
    ///
    /// See [`ReplyChannel::send`].
    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.channel.send(line).await
    }

    /// Sends a line that must not be logged, such as a SASL response.
    ///
    /// # Errors
    ///
    /// See [`ReplyChannel::send_sensitive`].
    pub async fn send_sensitive(&mut self, line: &str) -> Result<()> {
        self.channel.send_sensitive(line).await
    }

    /// Reads one reply.
    ///
    /// # Errors
    ///
    /// See [`ReplyChannel::receive`].
    pub async fn receive(&mut self) -> Result<Reply> {
        let reply = self.channel.receive().await?;
        self.envelope.observe(&reply);
        Ok(reply)
    }

    /// Sends a command line and reads its reply.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send) and [`receive`](Self::receive).
    pub async fn send_receive(&mut self, line: &str) -> Result<Reply> {
        self.send(line).await?;
        self.receive().await
    }

    /// Reads one reply and requires it to be positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for a non-success reply.
    pub async fn receive_and_check(&mut self) -> Result<Reply> {
        check(self.receive().await?)
    }

    /// Sends a command line and requires a positive reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for a non-success reply.
    pub async fn send_and_check(&mut self, line: &str) -> Result<Reply> {
        self.send(line).await?;
        self.receive_and_check().await
    }
}

/// Drives one SMTP conversation over a [`ReplyChannel`].
///
/// Commands are strictly sequential: each one is sent, then its reply is
/// awaited before anything else happens.
///
/// # Example
///
/// ```ignore
/// use mailgate_smtp::{Address, ClientConfig, SessionDriver};
///
/// let config = ClientConfig::builder("mx.example.com")
///     .helo_host("client.example.com")
///     .build();
/// let mut session = SessionDriver::connect(&config).await?;
/// session.from(&Address::new("alice@example.com")?).await?;
/// session.to(&Address::new("bob@example.org")?).await?;
/// session.data_start().await?;
/// session.data_write(b"Subject: hi\r\n\r\nHello\r\n").await?;
/// session.data_end().await?;
/// session.quit().await;
/// ```
pub struct SessionDriver<S, A = NoAuthenticator> {
    channel: ReplyChannel<S>,
    helo_host: String,
    extensions: Extensions,
    envelope: EnvelopeState,
    authenticator: Option<A>,
    state: SessionState,
}

impl<S> SessionDriver<S> {
    /// Wraps an open channel. Call [`start`](Self::start) next.
    #[must_use]
    pub fn new(channel: ReplyChannel<S>, helo_host: impl Into<String>) -> Self {
        let state = if channel.is_connected() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        };
        Self {
            channel,
            helo_host: helo_host.into(),
            extensions: Extensions::new(),
            envelope: EnvelopeState::default(),
            authenticator: None,
            state,
        }
    }

    /// Installs an authenticator to run after negotiation.
    #[must_use]
    pub fn with_authenticator<A>(self, authenticator: A) -> SessionDriver<S, A> {
        SessionDriver {
            channel: self.channel,
            helo_host: self.helo_host,
            extensions: self.extensions,
            envelope: self.envelope,
            authenticator: Some(authenticator),
            state: self.state,
        }
    }
}

impl SessionDriver<TcpStream> {
    /// Connects, reads the greeting and negotiates capabilities.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the connection cannot be opened, or the
    /// first error of the setup exchange. The connection is torn down before
    /// the error is returned.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let channel = ReplyChannel::connect(config).await?;
        let mut driver = Self::new(channel, config.helo_host.clone());
        driver.start().await?;
        Ok(driver)
    }
}

impl<A: Authenticator> SessionDriver<TcpStream, A> {
    /// Like [`SessionDriver::connect`], then runs `authenticator`.
    ///
    /// # Errors
    ///
    /// See [`SessionDriver::connect`]. Authentication failures are reported
    /// the same way.
    pub async fn connect_with_authenticator(config: &ClientConfig, authenticator: A) -> Result<Self> {
        let channel = ReplyChannel::connect(config).await?;
        let plain: SessionDriver<TcpStream> = SessionDriver::new(channel, config.helo_host.clone());
        let mut driver = plain.with_authenticator(authenticator);
        driver.start().await?;
        Ok(driver)
    }
}

impl<S, A> SessionDriver<S, A> {
    /// Name announced in EHLO/HELO.
    #[must_use]
    pub fn helo_host(&self) -> &str {
        &self.helo_host
    }

    /// Peer name used in log output.
    #[must_use]
    pub fn host_port(&self) -> &str {
        self.channel.host_port()
    }

    /// Recipients accepted so far in this session.
    #[must_use]
    pub const fn recipient_count(&self) -> usize {
        self.envelope.recipient_count
    }

    /// Extensions from the most recent EHLO. Empty after a HELO fallback.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// The configured authenticator, if any.
    #[must_use]
    pub const fn authenticator(&self) -> Option<&A> {
        self.authenticator.as_ref()
    }

    /// Returns true if an authenticator is configured.
    #[must_use]
    pub const fn has_authenticator(&self) -> bool {
        self.authenticator.is_some()
    }

    /// True once the server has announced it is closing the channel (421).
    #[must_use]
    pub const fn server_closing(&self) -> bool {
        self.envelope.server_closing
    }

    /// Envelope counters.
    #[must_use]
    pub const fn envelope(&self) -> &EnvelopeState {
        &self.envelope
    }

    /// Current conversation state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Underlying channel.
    #[must_use]
    pub const fn channel(&self) -> &ReplyChannel<S> {
        &self.channel
    }

    fn exchange(&mut self) -> Exchange<'_, S> {
        Exchange {
            channel: &mut self.channel,
            envelope: &mut self.envelope,
            extensions: &self.extensions,
        }
    }
}

impl<S, A> SessionDriver<S, A>
where
    S: AsyncRead + AsyncWrite + Unpin,
    A: Authenticator,
{
    /// Reads the greeting, negotiates and authenticates.
    ///
    /// On failure the session is torn down before the error is returned: a
    /// protocol rejection is followed by a best-effort QUIT, while a broken
    /// transport is closed without sending anything further.
    ///
    /// # Errors
    ///
    /// Returns the first error of the setup exchange.
    pub async fn start(&mut self) -> Result<()> {
        match self.handshake().await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_transport_failure() {
                    debug!(peer = %self.channel.host_port(), error = %e, "Setup failed, closing");
                    self.channel.close().await;
                    self.state = SessionState::Closed;
                } else {
                    self.quit().await;
                }
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        self.exchange().receive_and_check().await?;
        self.negotiate().await?;
        self.authenticate().await
    }

    /// Sends EHLO, falling back to HELO if the server does not know EHLO.
    ///
    /// The extension table is cleared first, so it never holds entries from
    /// an earlier negotiation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if EHLO fails with anything other than
    /// 500 or 502, or if the HELO fallback fails, and
    /// [`Error::InvalidState`] while message content is being sent.
    pub async fn negotiate(&mut self) -> Result<()> {
        self.require_command_mode("EHLO")?;
        self.extensions.clear();

        let ehlo = Command::Ehlo {
            hostname: self.helo_host.clone(),
        };
        let reply = self.exchange().send_receive(&ehlo.to_string()).await?;

        if reply.is_success() {
            self.extensions = Extensions::from_ehlo(&reply);
        } else if reply.code == ReplyCode::SYNTAX_ERROR || reply.code == ReplyCode::NOT_IMPLEMENTED {
            debug!(code = %reply.code, "EHLO not supported, falling back to HELO");
            let helo = Command::Helo {
                hostname: self.helo_host.clone(),
            };
            self.exchange().send_and_check(&helo.to_string()).await?;
        } else {
            return Err(Error::Rejected(reply));
        }

        self.state = SessionState::Negotiated;
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<()> {
        let Some(authenticator) = &self.authenticator else {
            return Ok(());
        };
        let mut exchange = Exchange {
            channel: &mut self.channel,
            envelope: &mut self.envelope,
            extensions: &self.extensions,
        };
        authenticator.authenticate(&mut exchange).await?;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Sends `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the session is negotiated
    /// with no transaction open, and [`Error::Rejected`] if the server
    /// refuses the sender.
    pub async fn from(&mut self, from: &Address) -> Result<Reply> {
        self.require(&[SessionState::Negotiated, SessionState::Authenticated], "MAIL")?;
        let command = Command::MailFrom { from: from.clone() };
        let reply = self.exchange().send_and_check(&command.to_string()).await?;
        self.state = SessionState::InTransaction;
        Ok(reply)
    }

    /// Sends `RCPT TO`. The recipient count grows only if the server accepts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside a transaction, and
    /// [`Error::Rejected`] if the server refuses the recipient.
    pub async fn to(&mut self, to: &Address) -> Result<Reply> {
        self.require(&[SessionState::InTransaction], "RCPT")?;
        let command = Command::RcptTo { to: to.clone() };
        let reply = self.exchange().send_and_check(&command.to_string()).await?;
        self.envelope.recipient_count += 1;
        Ok(reply)
    }

    /// Sends `DATA` and waits for the go-ahead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside a transaction, and
    /// [`Error::Rejected`] if the server refuses DATA.
    pub async fn data_start(&mut self) -> Result<Reply> {
        self.require(&[SessionState::InTransaction], "DATA")?;
        let reply = self
            .exchange()
            .send_and_check(&Command::Data.to_string())
            .await?;
        self.state = SessionState::DataPhase;
        Ok(reply)
    }

    /// Writes message content. May be called any number of times between
    /// [`data_start`](Self::data_start) and [`data_end`](Self::data_end);
    /// content is dot-stuffed on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside the DATA phase, or the write
    /// error.
    pub async fn data_write(&mut self, data: &[u8]) -> Result<()> {
        self.require(&[SessionState::DataPhase], "data_write")?;
        self.channel.write_data(data).await
    }

    /// Terminates the content and waits for the server's verdict on the
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside the DATA phase, or
    /// [`Error::Rejected`] if the server refuses the message.
    pub async fn data_end(&mut self) -> Result<Reply> {
        self.require(&[SessionState::DataPhase], "data_end")?;
        self.channel.finish_data().await?;
        self.state = SessionState::Negotiated;
        self.exchange().receive_and_check().await
    }

    /// Sends one BDAT chunk and waits for its acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside a transaction, and
    /// [`Error::Rejected`] if the server refuses the chunk.
    pub async fn bdat(&mut self, chunk: impl AsRef<[u8]>, last: bool) -> Result<Reply> {
        self.require(&[SessionState::InTransaction, SessionState::ChunkPhase], "BDAT")?;
        let reply = self.exchange().bdat(chunk, last).await?;
        self.state = if last {
            SessionState::Negotiated
        } else {
            SessionState::ChunkPhase
        };
        Ok(reply)
    }

    /// Sends the final BDAT chunk.
    ///
    /// # Errors
    ///
    /// See [`bdat`](Self::bdat).
    pub async fn bdat_last(&mut self, chunk: impl AsRef<[u8]>) -> Result<Reply> {
        self.bdat(chunk, true).await
    }

    /// Sends `RSET`, abandoning any open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] while message content is being sent,
    /// and [`Error::Rejected`] if the server refuses it.
    pub async fn rset(&mut self) -> Result<Reply> {
        self.require_command_mode("RSET")?;
        let reply = self
            .exchange()
            .send_and_check(&Command::Rset.to_string())
            .await?;
        self.state = SessionState::Negotiated;
        Ok(reply)
    }

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] while message content is being sent,
    /// and [`Error::Rejected`] if the server refuses it.
    pub async fn noop(&mut self) -> Result<Reply> {
        self.require_command_mode("NOOP")?;
        self.exchange()
            .send_and_check(&Command::Noop.to_string())
            .await
    }

    /// Sends an arbitrary command line and requires a positive reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] while message content is being sent,
    /// and [`Error::Rejected`] for a non-success reply.
    pub async fn send_and_check(&mut self, line: &str) -> Result<Reply> {
        self.require_command_mode("command")?;
        self.exchange().send_and_check(line).await
    }

    /// Ends the session.
    ///
    /// QUIT is sent only while connected, outside the DATA phase, and only
    /// if the server has not replied 421. Its failure is logged, never
    /// returned. The transport is closed in every case.
    pub async fn quit(&mut self) {
        if self.state == SessionState::DataPhase {
            debug!(peer = %self.channel.host_port(), "Closing inside DATA, QUIT skipped");
        } else if self.channel.is_connected() && !self.envelope.server_closing {
            if let Err(e) = self
                .exchange()
                .send_and_check(&Command::Quit.to_string())
                .await
            {
                warn!(peer = %self.channel.host_port(), error = %e, "Failed to issue QUIT");
            }
        }
        self.channel.close().await;
        self.state = SessionState::Closed;
    }

    fn require(&self, allowed: &[SessionState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{operation} requires one of {allowed:?}, session is {:?}",
                self.state
            )))
        }
    }

    fn require_command_mode(&self, operation: &str) -> Result<()> {
        if self.state.in_content() {
            Err(Error::InvalidState(format!(
                "{operation} not allowed while sending content, session is {:?}",
                self.state
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn driver(mock: tokio_test::io::Mock) -> SessionDriver<tokio_test::io::Mock> {
        SessionDriver::new(ReplyChannel::from_stream(mock, "mock"), "client.example.com")
    }

    #[tokio::test]
    async fn test_start_parses_extensions() {
        let mock = Builder::new()
            .read(b"220 mx.example.com ESMTP\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-mx.example.com\r\n250-size 1000\r\n250 CHUNKING\r\n")
            .build();
        let mut session = driver(mock);
        session.start().await.unwrap();

        assert_eq!(session.state(), SessionState::Negotiated);
        assert_eq!(session.extensions().max_size(), Some(1000));
        assert!(session.extensions().supports_chunking());
        assert_eq!(session.extensions().len(), 2);
    }

    #[tokio::test]
    async fn test_recipient_count_only_on_success() {
        let mock = Builder::new()
            .write(b"RCPT TO: <a@example.com>\r\n")
            .read(b"250 Ok\r\n")
            .write(b"RCPT TO: <b@example.com>\r\n")
            .read(b"550 No such user\r\n")
            .build();
        let mut session = driver(mock);
        session.state = SessionState::InTransaction;

        session.to(&Address::new("a@example.com").unwrap()).await.unwrap();
        let err = session
            .to(&Address::new("b@example.com").unwrap())
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert_eq!(session.recipient_count(), 1);
    }

    #[tokio::test]
    async fn test_data_write_outside_data_phase() {
        let mut session = driver(Builder::new().build());
        let err = session.data_write(b"x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_421_sets_server_closing() {
        let mock = Builder::new()
            .write(b"NOOP\r\n")
            .read(b"421 shutting down\r\n")
            .build();
        let mut session = driver(mock);
        let err = session.noop().await.unwrap_err();

        assert!(err.is_transient());
        assert!(session.server_closing());
        assert!(session.envelope().server_closing());
    }

    #[tokio::test]
    async fn test_quit_after_421_sends_nothing() {
        let mock = Builder::new()
            .write(b"NOOP\r\n")
            .read(b"421 shutting down\r\n")
            .build();
        let mut session = driver(mock);
        let _ = session.noop().await;

        session.quit().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.channel().is_connected());
    }

    #[tokio::test]
    async fn test_quit_failure_is_swallowed() {
        let mock = Builder::new()
            .write(b"QUIT\r\n")
            .read(b"500 what\r\n")
            .build();
        let mut session = driver(mock);
        session.quit().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.channel().is_connected());
    }

    #[tokio::test]
    async fn test_with_authenticator_keeps_state() {
        let session = driver(Builder::new().build());
        assert!(!session.has_authenticator());
        let session = session.with_authenticator(crate::PlainAuthenticator::new("u", "p"));
        assert!(session.has_authenticator());
        assert_eq!(session.authenticator().unwrap().username(), "u");
        assert_eq!(session.helo_host(), "client.example.com");
        assert_eq!(session.host_port(), "mock");
    }

    fn invalid_state<T>(result: Result<T>) -> bool {
        matches!(result, Err(Error::InvalidState(_)))
    }

    #[tokio::test]
    async fn test_commands_refused_during_data_phase() {
        let mut session = driver(Builder::new().build());
        session.state = SessionState::DataPhase;
        let a = Address::new("a@example.com").unwrap();

        assert!(invalid_state(session.from(&a).await));
        assert!(invalid_state(session.to(&a).await));
        assert!(invalid_state(session.data_start().await));
        assert!(invalid_state(session.bdat("x", false).await));
        assert!(invalid_state(session.rset().await));
        assert!(invalid_state(session.noop().await));
        assert!(invalid_state(session.send_and_check("VRFY a").await));
        assert!(invalid_state(session.negotiate().await));
        assert_eq!(session.state(), SessionState::DataPhase);
    }

    #[tokio::test]
    async fn test_chunk_phase_accepts_only_bdat() {
        let mock = Builder::new()
            .write(b"BDAT 3 LAST\r\n")
            .write(b"end")
            .read(b"250 queued\r\n")
            .build();
        let mut session = driver(mock);
        session.state = SessionState::ChunkPhase;
        let a = Address::new("a@example.com").unwrap();

        assert!(invalid_state(session.from(&a).await));
        assert!(invalid_state(session.to(&a).await));
        assert!(invalid_state(session.data_start().await));
        assert!(invalid_state(session.rset().await));
        assert!(invalid_state(session.noop().await));
        assert!(invalid_state(session.data_write(b"x").await));

        session.bdat_last("end").await.unwrap();
        assert_eq!(session.state(), SessionState::Negotiated);
    }

    #[tokio::test]
    async fn test_envelope_commands_need_open_transaction() {
        let mut session = driver(Builder::new().build());
        session.state = SessionState::Negotiated;
        let a = Address::new("a@example.com").unwrap();

        assert!(invalid_state(session.to(&a).await));
        assert!(invalid_state(session.data_start().await));
        assert!(invalid_state(session.bdat_last("x").await));
        assert!(invalid_state(session.data_end().await));
        assert_eq!(session.recipient_count(), 0);
    }

    #[tokio::test]
    async fn test_second_mail_inside_transaction_refused() {
        let mut session = driver(Builder::new().build());
        session.state = SessionState::InTransaction;
        let err = session
            .from(&Address::new("a@example.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_quit_inside_data_phase_only_closes() {
        let mut session = driver(Builder::new().build());
        session.state = SessionState::DataPhase;
        session.quit().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.channel().is_connected());
    }

    #[tokio::test]
    async fn test_new_driver_starts_connected() {
        let session = driver(Builder::new().build());
        assert_eq!(session.state(), SessionState::Connected);
    }
}
