//! Message handler contract and a basic collecting implementation.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::admission::Rejection;

/// Default code for a handler rejection.
pub const DEFAULT_REJECT_CODE: u16 = 554;

/// Code sent when a message exceeds the size limit.
pub const TOO_MUCH_DATA_CODE: u16 = 552;

/// Failure raised by a [`MessageHandler`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Refuse this step; the session continues.
    #[error("{code} {message}")]
    Reject {
        /// Reply code.
        code: u16,
        /// Reply text.
        message: String,
    },

    /// End the session after sending the reply.
    #[error("{0}")]
    DropConnection(Rejection),

    /// The message is larger than allowed.
    #[error("552 {0}")]
    TooMuchData(String),
}

impl HandlerError {
    /// A rejection with the default 554 code.
    #[must_use]
    pub fn reject(message: impl Into<String>) -> Self {
        Self::Reject {
            code: DEFAULT_REJECT_CODE,
            message: message.into(),
        }
    }

    /// The reply line to send for this failure.
    #[must_use]
    pub fn error_response(&self) -> String {
        self.to_string()
    }
}

/// Receives the parts of one mail transaction as the session accepts them.
///
/// Each method may refuse its step with a [`HandlerError`].
pub trait MessageHandler: Send {
    /// Sender from `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to refuse the sender.
    fn from(&mut self, from: &str) -> Result<(), HandlerError>;

    /// One recipient from `RCPT TO`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to refuse the recipient.
    fn recipient(&mut self, recipient: &str) -> Result<(), HandlerError>;

    /// Complete message content. A returned string replaces the default
    /// acceptance text.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] to refuse the message.
    fn data(&mut self, data: &[u8]) -> Result<Option<String>, HandlerError>;

    /// Called when the transaction ends, accepted or not.
    fn done(&mut self);
}

/// Error type returned by a [`MessageListener`].
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback receiving each complete message.
pub trait MessageListener: Send + Sync {
    /// A message was received.
    ///
    /// # Errors
    ///
    /// An error refuses the message.
    fn message_arrived(&self, from: &str, recipients: &[String], data: &[u8])
    -> Result<(), ListenerError>;
}

impl<F> MessageListener for F
where
    F: Fn(&str, &[String], &[u8]) -> Result<(), ListenerError> + Send + Sync,
{
    fn message_arrived(
        &self,
        from: &str,
        recipients: &[String],
        data: &[u8],
    ) -> Result<(), ListenerError> {
        self(from, recipients, data)
    }
}

/// Creates a [`BasicMessageHandler`] per transaction.
#[derive(Clone)]
pub struct BasicMessageHandlerFactory {
    listener: Arc<dyn MessageListener>,
    max_message_size: usize,
}

impl BasicMessageHandlerFactory {
    /// `max_message_size` of 0 means unlimited.
    #[must_use]
    pub fn new(listener: Arc<dyn MessageListener>, max_message_size: usize) -> Self {
        Self {
            listener,
            max_message_size,
        }
    }

    /// Creates a handler for a new transaction.
    #[must_use]
    pub fn create(&self) -> BasicMessageHandler {
        BasicMessageHandler {
            listener: Arc::clone(&self.listener),
            max_message_size: self.max_message_size,
            from: None,
            recipients: Vec::new(),
        }
    }
}

impl fmt::Debug for BasicMessageHandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicMessageHandlerFactory")
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

/// Collects sender, recipients and content, then hands them to a
/// [`MessageListener`].
pub struct BasicMessageHandler {
    listener: Arc<dyn MessageListener>,
    max_message_size: usize,
    from: Option<String>,
    recipients: Vec<String>,
}

impl BasicMessageHandler {
    /// Recipients collected so far.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }
}

impl fmt::Debug for BasicMessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicMessageHandler")
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .finish_non_exhaustive()
    }
}

impl MessageHandler for BasicMessageHandler {
    fn from(&mut self, from: &str) -> Result<(), HandlerError> {
        self.from = Some(from.to_string());
        Ok(())
    }

    fn recipient(&mut self, recipient: &str) -> Result<(), HandlerError> {
        self.recipients.push(recipient.to_string());
        Ok(())
    }

    fn data(&mut self, data: &[u8]) -> Result<Option<String>, HandlerError> {
        if self.max_message_size > 0 && data.len() > self.max_message_size {
            return Err(HandlerError::TooMuchData(format!(
                "message size exceeded maximum of {} bytes",
                self.max_message_size
            )));
        }
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| HandlerError::reject("from not set"))?;
        if self.recipients.is_empty() {
            return Err(HandlerError::reject("recipients not set"));
        }

        debug!(from, recipients = self.recipients.len(), size = data.len(), "Message arrived");
        self.listener
            .message_arrived(from, &self.recipients, data)
            .map_err(|e| HandlerError::reject(format!("message could not be accepted: {e}")))?;
        Ok(None)
    }

    fn done(&mut self) {}
}
