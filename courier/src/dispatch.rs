use courier_common::{Message, MessageError};
use courier_pool::{AcquireError, Pool};
use courier_smtp::{MailTransaction, SessionError, SmtpClient, SmtpTimeouts};
use thiserror::Error;
use tracing::Instrument;
use ulid::Ulid;

/// Why a payload was dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unable to parse message: {0}")]
    Payload(#[from] MessageError),

    #[error("Unable to get a connection from the pool: {0}")]
    Acquire(#[from] AcquireError),

    #[error("Error sending mail: {0}")]
    Session(#[from] SessionError),
}

/// Turns bus payloads into mail submissions over pooled connections.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Pool<SmtpClient>,
    sender: String,
    timeouts: SmtpTimeouts,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(pool: Pool<SmtpClient>, sender: String, timeouts: SmtpTimeouts) -> Self {
        Self {
            pool,
            sender,
            timeouts,
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &Pool<SmtpClient> {
        &self.pool
    }

    /// Delivers one payload under its own session id.
    ///
    /// The outcome is logged here; the returned result is for callers that
    /// need to act on it.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the payload is not a valid message, no
    /// connection could be acquired, or the server refused the message. A
    /// connection that saw a session error is discarded, never reused.
    pub async fn handle(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let session = Ulid::new();
        let span = tracing::info_span!("message", session = %session);

        async {
            tracing::info!(bytes = payload.len(), "Received message on topic");

            let result = self.deliver(payload).await;
            match &result {
                Ok(()) => tracing::info!("Processed mail to SMTP server"),
                Err(e @ DispatchError::Payload(_)) => tracing::warn!("{e}"),
                Err(DispatchError::Session(e)) => match e.step() {
                    Some(step) => tracing::error!(%step, "Error sending mail: {e}"),
                    None => tracing::error!("Error sending mail: {e}"),
                },
                Err(e) => tracing::error!("{e}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn deliver(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let message = Message::from_json(payload)?;
        let mut connection = self.pool.acquire().await?;

        let result = MailTransaction::new(&self.sender, &message, &self.timeouts)
            .execute(&mut connection)
            .await;

        if result.is_ok() {
            connection.release();
        } else {
            connection.discard().await;
        }

        result.map_err(DispatchError::from)
    }
}
