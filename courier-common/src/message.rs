//! The message relayed from the bus to the mail server.
//!
//! Inbound payloads are JSON objects of the form
//! `{"title": "...", "body": "...", "to": ["..."]}`. Deserialization
//! validates every recipient, so a [`Message`] obtained from
//! [`Message::from_json`] or [`Message::new`] always has at least one
//! well-formed recipient.

use mailparse::MailAddr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Message has no recipients")]
    NoRecipients,

    #[error("Invalid recipient address: {0:?}")]
    InvalidRecipient(String),
}

#[derive(Deserialize)]
struct RawMessage {
    title: String,
    body: String,
    to: Vec<String>,
}

/// An immutable mail to deliver: a subject line, a plain-text body and an
/// ordered list of envelope recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    pub title: String,
    pub body: String,
    pub to: Vec<String>,
}

impl TryFrom<RawMessage> for Message {
    type Error = MessageError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Self::new(raw.title, raw.body, raw.to)
    }
}

impl Message {
    /// Builds a message, validating and normalising each recipient.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::NoRecipients`] if `to` is empty, or
    /// [`MessageError::InvalidRecipient`] for the first recipient that is not
    /// a single mailbox.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        to: Vec<String>,
    ) -> Result<Self, MessageError> {
        if to.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        let to = to
            .iter()
            .map(|recipient| parse_recipient(recipient))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            title: title.into(),
            body: body.into(),
            to,
        })
    }

    /// Deserializes a bus payload.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Malformed`] if the payload is not a valid JSON
    /// message, or the validation errors of [`Message::new`].
    pub fn from_json(payload: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice::<RawMessage>(payload)
            .map_err(|e| MessageError::Malformed(e.to_string()))
            .and_then(Self::try_from)
    }

    /// Renders the DATA section: a single `Subject` header, a blank line and
    /// the body.
    ///
    /// Line breaks in the title are folded into spaces so the title cannot
    /// introduce extra headers.
    #[must_use]
    pub fn format_body(&self) -> String {
        let subject: String = self
            .title
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();

        format!("Subject: {subject}\r\n\r\n{}\r\n", self.body)
    }
}

fn parse_recipient(recipient: &str) -> Result<String, MessageError> {
    let invalid = || MessageError::InvalidRecipient(recipient.to_string());

    if recipient.chars().any(char::is_control) {
        return Err(invalid());
    }

    let parsed = mailparse::addrparse(recipient).map_err(|_| invalid())?;
    match parsed.as_slice() {
        [MailAddr::Single(info)] if info.addr.contains('@') => Ok(info.addr.clone()),
        _ => Err(invalid()),
    }
}
