//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Minimum length of a reply line: three digits plus the separator.
const MIN_LINE_CHARS: usize = 4;

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// Only the code of the last line is used; the separators of earlier lines
/// have already decided where the reply ends.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if a line is too short or the code is
/// not numeric.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(last) = lines.last() else {
        return Err(Error::MalformedReply("empty reply".into()));
    };

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        message.push(reply_line_body(line)?.to_string());
    }

    let code = parse_code(last)?;
    Ok(Reply::new(code, message))
}

/// Returns the text after the code and separator.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the line is shorter than four characters.
pub fn reply_line_body(line: &str) -> Result<&str> {
    match line.char_indices().nth(MIN_LINE_CHARS - 1) {
        Some((sep, c)) => Ok(&line[sep + c.len_utf8()..]),
        None => Err(Error::MalformedReply(line.to_string())),
    }
}

/// Checks if a line is the last line of a reply.
///
/// Continuation lines carry `-` at offset 3; anything else ends the reply.
/// Lines too short to carry a separator are reported by [`reply_line_body`].
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.chars().nth(3) != Some('-')
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(0..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::MalformedReply(line.to_string()))?;
    digits
        .parse::<u16>()
        .map(ReplyCode::new)
        .map_err(|_| Error::MalformedReply(line.to_string()))
}
