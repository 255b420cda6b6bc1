//! SMTP extension table.

use std::collections::HashMap;

use super::Reply;

/// SMTP extensions discovered from an EHLO response.
///
/// Keys are extension keywords in upper case (`AUTH`, `SIZE`, `CHUNKING`),
/// values are the unparsed parameter text exactly as the server sent it.
/// Empty when the server only speaks HELO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    entries: HashMap<String, String>,
}

impl Extensions {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the extension lines of a successful EHLO reply.
    ///
    /// The first line carries the server name and greeting and is skipped.
    #[must_use]
    pub fn from_ehlo(reply: &Reply) -> Self {
        let mut extensions = Self::new();
        for line in reply.message.iter().skip(1) {
            extensions.insert_line(line);
        }
        extensions
    }

    /// Adds one `KEYWORD[ params]` line.
    pub fn insert_line(&mut self, line: &str) {
        let (keyword, params) = line.split_once(' ').unwrap_or((line, ""));
        self.entries
            .insert(keyword.to_uppercase(), params.to_string());
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the parameter text for an extension, if advertised.
    #[must_use]
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.entries
            .get(&keyword.to_uppercase())
            .map(String::as_str)
    }

    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.entries.contains_key(&keyword.to_uppercase())
    }

    /// Checks if the server accepts BDAT.
    #[must_use]
    pub fn supports_chunking(&self) -> bool {
        self.supports("CHUNKING")
    }

    /// Returns the maximum message size, if advertised with a value.
    #[must_use]
    pub fn max_size(&self) -> Option<usize> {
        self.get("SIZE")?.split_whitespace().next()?.parse().ok()
    }

    /// Returns the recognised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.get("AUTH")
            .map(|params| {
                params
                    .split_whitespace()
                    .filter_map(AuthMechanism::parse)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of advertised extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no extension was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(keyword, parameters)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A SASL mechanism named in the `AUTH` extension.
///
/// Only [`AuthMechanism::Plain`] is spoken by this crate; the others are
/// recognised so callers can see what the server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `PLAIN`
    Plain,
    /// `LOGIN`
    Login,
    /// `CRAM-MD5`
    CramMd5,
    /// `XOAUTH2`
    XOAuth2,
    /// `OAUTHBEARER`
    OAuthBearer,
}

impl AuthMechanism {
    const ALL: [Self; 5] = [
        Self::Plain,
        Self::Login,
        Self::CramMd5,
        Self::XOAuth2,
        Self::OAuthBearer,
    ];

    /// Looks a mechanism up by name, ignoring ASCII case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mechanism| mechanism.as_str().eq_ignore_ascii_case(name))
    }

    /// Name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    fn ehlo(lines: &[&str]) -> Reply {
        Reply::new(
            ReplyCode::OK,
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    mod extension_table_tests {
        use super::*;

        #[test]
        fn parse_keywords_and_params() {
            let ext = Extensions::from_ehlo(&ehlo(&["mx.example.com greets you", "A", "B p1 p2", "C"]));
            assert_eq!(ext.len(), 3);
            assert_eq!(ext.get("A"), Some(""));
            assert_eq!(ext.get("B"), Some("p1 p2"));
            assert_eq!(ext.get("C"), Some(""));
        }

        #[test]
        fn keyword_uppercased_params_verbatim() {
            let ext = Extensions::from_ehlo(&ehlo(&["banner", "auth Plain login"]));
            assert!(ext.supports("AUTH"));
            assert_eq!(ext.get("AUTH"), Some("Plain login"));
            assert_eq!(ext.iter().next(), Some(("AUTH", "Plain login")));
        }

        #[test]
        fn banner_only_is_empty() {
            let ext = Extensions::from_ehlo(&ehlo(&["mx.example.com"]));
            assert!(ext.is_empty());
        }

        #[test]
        fn max_size() {
            let ext = Extensions::from_ehlo(&ehlo(&["banner", "SIZE 52428800"]));
            assert_eq!(ext.max_size(), Some(52_428_800));

            let ext = Extensions::from_ehlo(&ehlo(&["banner", "SIZE"]));
            assert_eq!(ext.max_size(), None);
        }

        #[test]
        fn auth_mechanisms() {
            let ext = Extensions::from_ehlo(&ehlo(&["banner", "AUTH PLAIN LOGIN X-UNKNOWN"]));
            assert_eq!(
                ext.auth_mechanisms(),
                vec![AuthMechanism::Plain, AuthMechanism::Login]
            );
            assert!(Extensions::new().auth_mechanisms().is_empty());
        }

        #[test]
        fn chunking() {
            let ext = Extensions::from_ehlo(&ehlo(&["banner", "chunking"]));
            assert!(ext.supports_chunking());
        }

        #[test]
        fn clear() {
            let mut ext = Extensions::from_ehlo(&ehlo(&["banner", "8BITMIME"]));
            ext.clear();
            assert!(ext.is_empty());
        }
    }

    #[test]
    fn mechanism_names_ignore_case() {
        for mechanism in AuthMechanism::ALL {
            assert_eq!(AuthMechanism::parse(mechanism.as_str()), Some(mechanism));
            let lower = mechanism.as_str().to_ascii_lowercase();
            assert_eq!(AuthMechanism::parse(&lower), Some(mechanism));
        }
        assert_eq!(AuthMechanism::parse("GSSAPI"), None);
    }
}
