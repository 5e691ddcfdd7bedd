//! A minimal SMTP client over TCP, upgradable to TLS with STARTTLS.
//!
//! The client is deliberately low level: every method sends one command and
//! returns the server's reply, leaving it to the caller to decide whether the
//! reply is acceptable. [`SmtpConnector`](crate::SmtpConnector) and
//! [`MailTransaction`](crate::MailTransaction) build the submission flow on
//! top of it.
//!
//! ```no_run
//! use courier_smtp::{SmtpClient, TlsVerification};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("smtp.example.com:587", "smtp.example.com".to_string())
//!     .await?
//!     .tls_verification(TlsVerification::Strict);
//!
//! client.read_greeting().await?;
//! client.ehlo("relay.example.com").await?;
//! client.starttls().await?;
//! client.ehlo("relay.example.com").await?;
//! client.auth_plain("relay@example.com", "secret").await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use response::{Response, ResponseLine};
pub use smtp_client::SmtpClient;
