//! Error types for server-side session handling.

use std::io;

use crate::admission::Rejection;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Server error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error while talking to the client.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The session must end. The rejection is the last reply to send.
    #[error("Dropping connection: {0}")]
    DropConnection(Rejection),

    /// A reply code outside 200..=599 was configured for a rejection.
    #[error("Invalid SMTP response code {0}")]
    InvalidReplyCode(u16),
}
