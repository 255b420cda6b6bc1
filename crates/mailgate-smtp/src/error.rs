//! Error types for SMTP operations.

use std::io;

use crate::codec::DecodeError;
use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, including connect and reply timeouts.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection before sending any reply line.
    #[error("Server disconnected unexpectedly, no reply received")]
    Disconnected,

    /// The peer sent something that is not a valid SMTP reply.
    #[error("Malformed SMTP reply: {0}")]
    MalformedReply(String),

    /// Server returned a well-formed, non-success reply.
    #[error("SMTP error {}: {}", .0.code, .0.message_text())]
    Rejected(Reply),

    /// The incoming byte stream is not valid UTF-8.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Authentication could not be carried out.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns the reply carried by a protocol rejection.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Rejected(reply) => Some(reply),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected(reply) if reply.code.is_permanent())
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Rejected(reply) if reply.code.is_transient())
    }

    /// Returns true if the transport can no longer be trusted to carry commands.
    ///
    /// Covers I/O failures, a peer that vanished, a peer that sent garbage and
    /// undecodable input. Issuing QUIT after any of these is pointless.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Disconnected | Self::MalformedReply(_) | Self::Decode(_)
        )
    }
}
