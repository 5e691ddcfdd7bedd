use std::{fmt, time::Duration};

use thiserror::Error;

use crate::client::{ClientError, Response};

/// Failure to bring a connection into the authenticated, ready state.
#[derive(Debug, Error)]
pub enum EstablishError {
    /// TCP connect, greeting or the initial EHLO failed.
    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// STARTTLS was refused or the TLS handshake failed.
    #[error("TLS handshake with {address} failed: {reason}")]
    Handshake { address: String, reason: String },

    /// The server rejected the credentials.
    #[error("Authentication as {username} failed: {reason}")]
    Auth { username: String, reason: String },
}

/// The command of a mail transaction that was in flight when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStep {
    MailFrom,
    Recipient(String),
    Data,
    Body,
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MailFrom => f.write_str("MAIL FROM"),
            Self::Recipient(address) => write!(f, "RCPT TO <{address}>"),
            Self::Data => f.write_str("DATA"),
            Self::Body => f.write_str("message body"),
        }
    }
}

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("server replied {0}")]
    Rejected(Response),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

/// Failure of a mail transaction.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Message has no recipients")]
    NoRecipients,

    #[error("{step} failed: {cause}")]
    Protocol {
        step: SessionStep,
        #[source]
        cause: StepFailure,
    },
}

impl SessionError {
    /// The step that failed, if the transaction got as far as the wire.
    #[must_use]
    pub const fn step(&self) -> Option<&SessionStep> {
        match self {
            Self::NoRecipients => None,
            Self::Protocol { step, .. } => Some(step),
        }
    }
}
