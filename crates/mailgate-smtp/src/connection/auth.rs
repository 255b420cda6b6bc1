//! Authentication hook invoked after capability negotiation.

use base64::Engine;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Exchange;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::AuthMechanism;

/// Performs an authentication exchange on a negotiated session.
///
/// The session driver calls [`authenticate`](Self::authenticate) once, right
/// after EHLO/HELO succeeds, and propagates any error it returns.
pub trait Authenticator {
    /// Runs the exchange over `exchange`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials or the
    /// exchange cannot be carried out.
    fn authenticate<S>(&self, exchange: &mut Exchange<'_, S>) -> impl Future<Output = Result<()>>
    where
        S: AsyncRead + AsyncWrite + Unpin;
}

/// Authenticator that does nothing. The default for unauthenticated sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthenticator;

impl Authenticator for NoAuthenticator {
    fn authenticate<S>(&self, _exchange: &mut Exchange<'_, S>) -> impl Future<Output = Result<()>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        std::future::ready(Ok(()))
    }
}

/// `AUTH PLAIN` (RFC 4616) with the credentials sent as an initial response.
#[derive(Clone)]
pub struct PlainAuthenticator {
    username: String,
    password: String,
}

impl PlainAuthenticator {
    /// Creates an authenticator for the given credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    fn initial_response(&self) -> String {
        let credentials = format!("\0{}\0{}", self.username, self.password);
        base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
    }
}

impl std::fmt::Debug for PlainAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainAuthenticator")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator for PlainAuthenticator {
    async fn authenticate<S>(&self, exchange: &mut Exchange<'_, S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !exchange.extensions().supports("AUTH") {
            return Err(Error::NotSupported("AUTH".into()));
        }
        if !exchange
            .extensions()
            .auth_mechanisms()
            .contains(&AuthMechanism::Plain)
        {
            return Err(Error::NotSupported("AUTH PLAIN".into()));
        }

        let command = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(self.initial_response()),
        };
        debug!(user = %self.username, "Authenticating with AUTH PLAIN");
        let reply = exchange.send_receive(&command.to_string()).await?;

        if reply.code.is_completion() {
            return Ok(());
        }
        if reply.code.is_intermediate() {
            // The credentials went out with the command, so a challenge means
            // the server did not accept them. Cancel the exchange.
            exchange.send_receive("*").await?;
            return Err(Error::Auth(format!(
                "unexpected challenge after initial response: {reply}"
            )));
        }
        Err(Error::Rejected(reply))
    }
}
