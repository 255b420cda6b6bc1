//! SMTP command builder.
//!
//! Commands render to a single line without a terminator; the reply channel
//! appends CRLF when it sends them.

use std::fmt;

use crate::types::{Address, AuthMechanism};

/// A client command, rendered by its `Display` impl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, the pre-ESMTP greeting.
    Helo {
        /// Name the client announces
        hostname: String,
    },
    /// `EHLO`; the reply lists extensions.
    Ehlo {
        /// Name the client announces
        hostname: String,
    },
    /// `AUTH`
    Auth {
        /// SASL mechanism
        mechanism: AuthMechanism,
        /// Base64 payload sent on the same line
        initial_response: Option<String>,
    },
    /// `MAIL FROM`, opening a transaction.
    MailFrom {
        /// Reverse-path; may be null
        from: Address,
    },
    /// `RCPT TO`
    RcptTo {
        /// Forward-path
        to: Address,
    },
    /// `DATA`; the body follows dot-stuffed.
    Data,
    /// `BDAT`; the chunk follows as raw bytes.
    Bdat {
        /// Byte length of the chunk
        size: usize,
        /// Appends `LAST`
        last: bool,
    },
    /// `RSET`
    Rset,
    /// `NOOP`
    Noop,
    /// `QUIT`
    Quit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {}", mechanism.as_str())?;
                match initial_response {
                    Some(payload) => write!(f, " {payload}"),
                    None => Ok(()),
                }
            }
            Self::MailFrom { from } => write!(f, "MAIL FROM: <{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO: <{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Bdat { size, last } => {
                let marker = if *last { " LAST" } else { "" };
                write!(f, "BDAT {size}{marker}")
            }
            Self::Rset => f.write_str("RSET"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}
