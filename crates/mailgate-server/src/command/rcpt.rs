//! `RCPT TO`: add a recipient to the open transaction.

use tokio::io::AsyncWrite;

use super::{arg_predicate, extract_email_address};
use crate::error::{Error, Result};
use crate::handler::HandlerError;
use crate::session::Session;

/// Handler for `RCPT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcptCommand;

impl RcptCommand {
    /// Command verb.
    pub const NAME: &'static str = "RCPT";

    /// Help text.
    pub const HELP: &'static str = "Specifies the recipient. Can be used any number of times.";

    /// Argument synopsis.
    pub const ARGUMENTS: &'static str = "TO: <recipient> [ <parameters> ]";

    /// Runs the command for `line` on `session`.
    ///
    /// Refusals are answered on the session and are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DropConnection`] if the message handler asks for the
    /// session to end, and [`Error::Io`] if a reply cannot be written.
    pub async fn execute<W>(&self, line: &str, session: &mut Session<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if !session.is_mail_transaction_in_progress() {
            return session.send_response("503 5.5.1 Error: need MAIL command").await;
        }
        if let Some(max) = session.config().max_recipients
            && session.recipient_count() >= max
        {
            return session.send_response("452 Error: too many recipients").await;
        }

        let args = arg_predicate(line);
        if !args.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("TO:")) {
            return session
                .send_response(&format!(
                    "501 Syntax: RCPT TO: <address>  Error in parameters: \"{args}\""
                ))
                .await;
        }

        let recipient = extract_email_address(args, 3);
        match session.message_handler().recipient(recipient) {
            Ok(()) => {
                session.add_recipient(recipient);
                session.send_response("250 Ok").await
            }
            Err(HandlerError::DropConnection(rejection)) => Err(Error::DropConnection(rejection)),
            Err(refusal) => session.send_response(&refusal.error_response()).await,
        }
    }
}
