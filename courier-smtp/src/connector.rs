use std::{future::Future, time::Duration};

use async_trait::async_trait;
use courier_common::internal;
use courier_pool::{Connection, Connector};

use crate::{
    EstablishError, SmtpClient, SmtpConfig, TlsVerification,
    client::{ClientError, Response},
};

/// How long a pooled connection gets to say goodbye when it is closed.
const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens authenticated, encrypted SMTP submission sessions.
///
/// Each call to [`SmtpConnector::establish`] performs the full handshake:
/// greeting, EHLO, STARTTLS, EHLO again and AUTH PLAIN. The connector holds
/// no per-connection state and may be used from many tasks at once.
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    config: SmtpConfig,
}

/// Which handshake phase a failure belongs to.
#[derive(Clone, Copy)]
enum Phase {
    Connect,
    Handshake,
    Auth,
}

impl SmtpConnector {
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        if config.tls == TlsVerification::InsecureSkipVerify {
            tracing::warn!(
                host = %config.host,
                "SECURITY WARNING: certificate validation is disabled for the SMTP server. \
                 Connections are vulnerable to man-in-the-middle attacks."
            );
        }

        Self { config }
    }

    /// Opens one connection and brings it to the authenticated state.
    ///
    /// # Errors
    ///
    /// Returns [`EstablishError::Connect`] if the server cannot be reached or
    /// refuses the greeting/EHLO, [`EstablishError::Handshake`] if STARTTLS
    /// is not advertised or fails and [`EstablishError::Auth`] if AUTH PLAIN
    /// is not offered or the credentials are rejected.
    /// The transport is shut down before any error is returned.
    #[tracing::instrument(skip(self), fields(address = %self.config.address()))]
    pub async fn establish(&self) -> Result<SmtpClient, EstablishError> {
        let address = self.config.address();
        let timeouts = &self.config.timeouts;

        let mut client = match tokio::time::timeout(
            timeouts.connect(),
            SmtpClient::connect(&address, self.config.host.clone()),
        )
        .await
        {
            Ok(Ok(client)) => client.tls_verification(self.config.tls),
            Ok(Err(e)) => return Err(self.error(Phase::Connect, e.to_string())),
            Err(_) => {
                return Err(self.error(
                    Phase::Connect,
                    format!("no connection within {:?}", timeouts.connect()),
                ));
            }
        };

        match self.handshake(&mut client).await {
            Ok(()) => {
                internal!(
                    level = DEBUG,
                    "Established authenticated session with {}",
                    address
                );
                Ok(client)
            }
            Err(e) => {
                client.shutdown().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self, client: &mut SmtpClient) -> Result<(), EstablishError> {
        let helo = self.config.helo.as_str();

        self.require(Phase::Connect, client.read_greeting()).await?;
        let capabilities = self.require(Phase::Connect, client.ehlo(helo)).await?;
        if !capabilities.advertises("STARTTLS") {
            return Err(self.error(
                Phase::Handshake,
                "server does not advertise STARTTLS".to_string(),
            ));
        }

        self.require(Phase::Handshake, client.starttls()).await?;
        let capabilities = self.require(Phase::Handshake, client.ehlo(helo)).await?;
        if !capabilities.supports_auth("PLAIN") {
            return Err(self.error(
                Phase::Auth,
                "server does not offer AUTH PLAIN".to_string(),
            ));
        }

        let credentials = &self.config.credentials;
        self.require(
            Phase::Auth,
            client.auth_plain(&credentials.username, &credentials.password),
        )
        .await?;

        Ok(())
    }

    /// Runs one handshake command under the command timeout, requiring a
    /// 2xx reply.
    async fn require<F>(&self, phase: Phase, command: F) -> Result<Response, EstablishError>
    where
        F: Future<Output = Result<Response, ClientError>>,
    {
        let limit = self.config.timeouts.command();

        match tokio::time::timeout(limit, command).await {
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(self.error(phase, format!("server replied {response}"))),
            Ok(Err(e)) => Err(self.error(phase, e.to_string())),
            Err(_) => Err(self.error(phase, format!("no reply within {limit:?}"))),
        }
    }

    fn error(&self, phase: Phase, reason: String) -> EstablishError {
        let address = self.config.address();

        match phase {
            Phase::Connect => EstablishError::Connect { address, reason },
            Phase::Handshake => EstablishError::Handshake { address, reason },
            Phase::Auth => EstablishError::Auth {
                username: self.config.credentials.username.clone(),
                reason,
            },
        }
    }
}

#[async_trait]
impl Connector for SmtpConnector {
    type Connection = SmtpClient;
    type Error = EstablishError;

    async fn connect(&self) -> Result<SmtpClient, EstablishError> {
        self.establish().await
    }
}

#[async_trait]
impl Connection for SmtpClient {
    async fn close(mut self) {
        match tokio::time::timeout(QUIT_TIMEOUT, self.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("QUIT failed while closing connection: {e}"),
            Err(_) => tracing::debug!("No reply to QUIT within {QUIT_TIMEOUT:?}"),
        }

        self.shutdown().await;
    }
}
