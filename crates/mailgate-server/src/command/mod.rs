//! Server command handlers.

mod rcpt;

pub use rcpt::RcptCommand;

/// Everything after the four-letter verb and its separator, trimmed.
#[must_use]
pub fn arg_predicate(line: &str) -> &str {
    line.get(4..).map_or("", str::trim)
}

/// Pulls the mailbox out of a command argument such as `TO: <a@b> SIZE=1`.
///
/// `offset` skips the keyword (`TO:` or `FROM:`). An address in angle
/// brackets is taken up to the closing bracket; otherwise the first
/// space-delimited token is taken.
#[must_use]
pub fn extract_email_address(args: &str, offset: usize) -> &str {
    let address = args.get(offset..).unwrap_or("").trim();
    if let Some(bracketed) = address.strip_prefix('<') {
        bracketed.split_once('>').map_or(bracketed, |(inner, _)| inner)
    } else {
        address.split_once(' ').map_or(address, |(first, _)| first)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_predicate() {
        assert_eq!(arg_predicate("RCPT TO: <a@b>  "), "TO: <a@b>");
        assert_eq!(arg_predicate("RCPT"), "");
        assert_eq!(arg_predicate("RCP"), "");
    }

    #[test]
    fn test_extract_bracketed() {
        assert_eq!(extract_email_address("TO: <a@example.com>", 3), "a@example.com");
        assert_eq!(extract_email_address("TO:<a@example.com> NOTIFY=NEVER", 3), "a@example.com");
        assert_eq!(extract_email_address("TO:<>", 3), "");
        assert_eq!(extract_email_address("TO: <a@example.com", 3), "a@example.com");
    }

    #[test]
    fn test_extract_bare() {
        assert_eq!(extract_email_address("TO: a@example.com", 3), "a@example.com");
        assert_eq!(extract_email_address("TO:a@example.com SIZE=10", 3), "a@example.com");
        assert_eq!(extract_email_address("TO:", 3), "");
    }
}
