//! SMTP submission for courier.
//!
//! - [`SmtpConnector`] opens a connection, upgrades it with STARTTLS and
//!   authenticates, producing an [`SmtpClient`] ready for mail transactions.
//!   It implements [`courier_pool::Connector`] so a pool can be filled with
//!   these connections.
//! - [`MailTransaction`] drives one MAIL FROM / RCPT TO / DATA exchange over
//!   an already established client.

pub mod client;
mod config;
mod connector;
mod error;
mod transaction;

pub use client::{ClientError, Response, SmtpClient};
pub use config::{Credentials, SmtpConfig, SmtpTimeouts, TlsVerification};
pub use connector::SmtpConnector;
pub use error::{EstablishError, SessionError, SessionStep, StepFailure};
pub use transaction::MailTransaction;
