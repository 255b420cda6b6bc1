//! Server replies and their codes.

use std::fmt;

/// A complete server reply, possibly assembled from several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Code of the final line.
    pub code: ReplyCode,
    /// Text of each line, code and separator stripped.
    pub message: Vec<String>,
}

impl Reply {
    /// Builds a reply from its code and line texts.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Whether the server went along with the command.
    ///
    /// Preliminary and intermediate replies count: `354` after `DATA` and
    /// `334` after `AUTH` both let the exchange continue.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_positive()
    }

    /// Line texts joined by `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message_text())
    }
}

/// First digit of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// `1yz`
    PositivePreliminary,
    /// `2yz`
    PositiveCompletion,
    /// `3yz`
    PositiveIntermediate,
    /// `4yz`
    TransientNegative,
    /// `5yz`
    PermanentNegative,
    /// Anything outside `100..=599`.
    Unknown,
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// `250`
    pub const OK: Self = Self(250);
    /// `421`: the server is about to close the channel.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// `500`: command not recognized.
    pub const SYNTAX_ERROR: Self = Self(500);
    /// `502`: command not implemented.
    pub const NOT_IMPLEMENTED: Self = Self(502);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code by its first digit.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            1 => ReplyClass::PositivePreliminary,
            2 => ReplyClass::PositiveCompletion,
            3 => ReplyClass::PositiveIntermediate,
            4 => ReplyClass::TransientNegative,
            5 => ReplyClass::PermanentNegative,
            _ => ReplyClass::Unknown,
        }
    }

    /// `100..=399`.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        matches!(
            self.class(),
            ReplyClass::PositivePreliminary
                | ReplyClass::PositiveCompletion
                | ReplyClass::PositiveIntermediate
        )
    }

    /// `2yz`
    #[must_use]
    pub const fn is_completion(self) -> bool {
        matches!(self.class(), ReplyClass::PositiveCompletion)
    }

    /// `3yz`
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        matches!(self.class(), ReplyClass::PositiveIntermediate)
    }

    /// `4yz`
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self.class(), ReplyClass::TransientNegative)
    }

    /// `5yz`
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self.class(), ReplyClass::PermanentNegative)
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn reply(code: u16, lines: &[&str]) -> Reply {
        Reply::new(
            ReplyCode::new(code),
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn test_class_boundaries() {
        assert_eq!(ReplyCode::new(99).class(), ReplyClass::Unknown);
        assert_eq!(ReplyCode::new(100).class(), ReplyClass::PositivePreliminary);
        assert_eq!(ReplyCode::new(299).class(), ReplyClass::PositiveCompletion);
        assert_eq!(ReplyCode::new(354).class(), ReplyClass::PositiveIntermediate);
        assert_eq!(ReplyCode::new(421).class(), ReplyClass::TransientNegative);
        assert_eq!(ReplyCode::new(599).class(), ReplyClass::PermanentNegative);
        assert_eq!(ReplyCode::new(600).class(), ReplyClass::Unknown);
    }

    #[test]
    fn test_success_covers_one_through_three() {
        for code in [100, 220, 250, 334, 354, 399] {
            assert!(reply(code, &["x"]).is_success(), "{code}");
        }
        for code in [0, 99, 400, 421, 500, 554, 999] {
            assert!(!reply(code, &["x"]).is_success(), "{code}");
        }
    }

    #[test]
    fn test_negative_kinds() {
        assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
        assert!(!ReplyCode::SERVICE_UNAVAILABLE.is_permanent());
        assert!(ReplyCode::NOT_IMPLEMENTED.is_permanent());
        assert!(!ReplyCode::new(700).is_permanent());
    }

    #[test]
    fn test_completion_and_intermediate_are_disjoint() {
        assert!(ReplyCode::OK.is_completion());
        assert!(!ReplyCode::OK.is_intermediate());
        assert!(ReplyCode::new(334).is_intermediate());
        assert!(!ReplyCode::new(334).is_completion());
    }

    #[test]
    fn test_display() {
        assert_eq!(reply(220, &["mx ESMTP", "hi"]).to_string(), "220 mx ESMTP\nhi");
        assert_eq!(reply(250, &[]).to_string(), "250 ");
        assert_eq!(reply(250, &[]).message_text(), "");
        assert_eq!(format!("{:>5}", ReplyCode::SYNTAX_ERROR), "  500");
    }
}
