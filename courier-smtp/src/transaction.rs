use std::{future::Future, time::Duration};

use courier_common::Message;

use crate::{
    SessionError, SessionStep, SmtpClient, SmtpTimeouts, StepFailure,
    client::{ClientError, Response},
};

/// One MAIL FROM / RCPT TO / DATA exchange for a single message.
///
/// The transaction borrows an already authenticated client and leaves it
/// alone on failure: it never sends RSET, so after an error the connection
/// is in an unknown state and should be discarded by the caller.
#[derive(Debug)]
pub struct MailTransaction<'a> {
    sender: &'a str,
    message: &'a Message,
    timeouts: &'a SmtpTimeouts,
}

impl<'a> MailTransaction<'a> {
    #[must_use]
    pub const fn new(sender: &'a str, message: &'a Message, timeouts: &'a SmtpTimeouts) -> Self {
        Self {
            sender,
            message,
            timeouts,
        }
    }

    /// Submits the message.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoRecipients`] if the message has nobody to deliver
    /// to, checked before anything is sent. Otherwise
    /// [`SessionError::Protocol`] naming the first step the server rejected
    /// or that failed on the wire.
    #[tracing::instrument(skip_all, fields(recipients = self.message.to.len()))]
    pub async fn execute(&self, client: &mut SmtpClient) -> Result<(), SessionError> {
        if self.message.to.is_empty() {
            return Err(SessionError::NoRecipients);
        }

        let command = self.timeouts.command();

        run_step(
            SessionStep::MailFrom,
            command,
            Response::is_success,
            client.mail_from(self.sender),
        )
        .await?;

        for recipient in &self.message.to {
            run_step(
                SessionStep::Recipient(recipient.clone()),
                command,
                Response::is_success,
                client.rcpt_to(recipient),
            )
            .await?;
        }

        run_step(
            SessionStep::Data,
            command,
            Response::is_intermediate,
            client.data(),
        )
        .await?;

        let body = self.message.format_body();
        run_step(
            SessionStep::Body,
            self.timeouts.data(),
            Response::is_success,
            client.send_data(&body),
        )
        .await?;

        tracing::debug!("Message accepted for delivery");
        Ok(())
    }
}

/// Awaits one command under `limit` and checks the reply with `accept`.
async fn run_step<F>(
    step: SessionStep,
    limit: Duration,
    accept: fn(&Response) -> bool,
    command: F,
) -> Result<Response, SessionError>
where
    F: Future<Output = Result<Response, ClientError>>,
{
    let cause = match tokio::time::timeout(limit, command).await {
        Ok(Ok(response)) if accept(&response) => return Ok(response),
        Ok(Ok(response)) => StepFailure::Rejected(response),
        Ok(Err(e)) => StepFailure::Client(e),
        Err(_) => StepFailure::TimedOut(limit),
    };

    tracing::debug!(%step, %cause, "Mail transaction step failed");
    Err(SessionError::Protocol { step, cause })
}
