//! Envelope addresses.

use crate::error::{Error, Result};

/// A mailbox as it appears between the angle brackets of `MAIL FROM` or
/// `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Checks and wraps `addr`.
    ///
    /// Only the shape is checked: one `@` with text on both sides, and
    /// nothing that could break out of the command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] naming what is wrong.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// The empty reverse-path, `<>`.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Whether this is [`Address::null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// The mailbox text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        let problem = if addr.is_empty() {
            Some("empty address")
        } else if addr.contains(['\r', '\n']) {
            Some("line terminator in address")
        } else if addr.contains(['<', '>']) {
            Some("angle bracket in address")
        } else {
            match addr.split_once('@') {
                None => Some("missing @"),
                Some((_, domain)) if domain.contains('@') => Some("more than one @"),
                Some((local, domain)) if local.is_empty() || domain.is_empty() => {
                    Some("empty local part or domain")
                }
                Some(_) => None,
            }
        };
        match problem {
            Some(reason) => Err(Error::InvalidAddress(format!("{reason}: {addr:?}"))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
