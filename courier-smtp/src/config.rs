use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Certificate validation for the STARTTLS upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TlsVerification {
    /// Validate the server certificate against the system root store.
    #[default]
    Strict,

    /// Accept any certificate.
    ///
    /// **SECURITY WARNING**: this removes all protection against
    /// man-in-the-middle attacks. Only use it against test servers with
    /// self-signed certificates.
    InsecureSkipVerify,
}

/// Identity and secret for AUTH PLAIN.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client-side timeouts for the submission server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpTimeouts {
    /// Timeout for establishing the TCP connection.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for each command reply (EHLO, STARTTLS, AUTH, MAIL FROM,
    /// RCPT TO, DATA).
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Timeout for transferring the message body and receiving the final
    /// reply.
    ///
    /// Default: 120 seconds
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,
}

impl SmtpTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }
}

impl Default for SmtpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            command_secs: defaults::command_secs(),
            data_secs: defaults::data_secs(),
        }
    }
}

/// Where and how to submit mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    /// Default: 587 (submission)
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Name announced in EHLO.
    ///
    /// Default: `localhost`
    #[serde(default = "defaults::helo")]
    pub helo: String,

    /// Envelope sender. Falls back to the credential username.
    #[serde(default)]
    pub sender: Option<String>,

    pub credentials: Credentials,

    #[serde(default)]
    pub tls: TlsVerification,

    #[serde(default)]
    pub timeouts: SmtpTimeouts,
}

impl SmtpConfig {
    /// `host:port` to dial.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The envelope sender used for MAIL FROM.
    #[must_use]
    pub fn sender(&self) -> &str {
        self.sender
            .as_deref()
            .unwrap_or(self.credentials.username.as_str())
    }
}

mod defaults {
    pub const fn port() -> u16 {
        587
    }

    pub fn helo() -> String {
        "localhost".to_string()
    }

    pub const fn connect_secs() -> u64 {
        30
    }

    pub const fn command_secs() -> u64 {
        60
    }

    pub const fn data_secs() -> u64 {
        120
    }
}
