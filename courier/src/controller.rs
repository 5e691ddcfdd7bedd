use std::sync::Arc;

use anyhow::Context;
use courier_common::{internal, logging};
use courier_pool::Pool;
use courier_smtp::SmtpConnector;
use tokio::task::JoinSet;

use crate::{config::Config, dispatch::Dispatcher, source::MqttSource};

/// Waits for SIGINT or SIGTERM.
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

/// The relay process: one pool, one subscription, one task per message.
pub struct Courier {
    config: Config,
}

impl Courier {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the relay until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be filled or the signal
    /// handlers cannot be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        internal!(level = INFO, "Starting courier");

        let connector = SmtpConnector::new(self.config.smtp.clone());
        let pool = Pool::new(&self.config.pool, &connector)
            .await
            .with_context(|| {
                format!(
                    "Failed to open {} connections to {}",
                    self.config.pool.capacity,
                    self.config.smtp.address()
                )
            })?;

        let dispatcher = Arc::new(Dispatcher::new(
            pool.clone(),
            self.config.smtp.sender().to_string(),
            self.config.smtp.timeouts.clone(),
        ));

        let mut source = MqttSource::new(&self.config.mqtt);
        let mut in_flight = JoinSet::new();

        internal!(
            level = INFO,
            "Connecting to broker at {}:{}",
            self.config.mqtt.host,
            self.config.mqtt.port
        );

        let ret = tokio::select! {
            () = source.run(|payload| {
                while in_flight.try_join_next().is_some() {}

                let dispatcher = Arc::clone(&dispatcher);
                in_flight.spawn(async move {
                    // Already logged with its session id
                    let _ = dispatcher.handle(&payload).await;
                });
            }) => Ok(()),
            r = shutdown() => r,
        };

        internal!(level = INFO, "Shutting down...");
        source.disconnect().await;

        let grace = self.config.shutdown_grace();
        if tokio::time::timeout(grace, async { while in_flight.join_next().await.is_some() {} })
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = in_flight.len(),
                "In-flight messages did not finish within {grace:?}, abandoning them"
            );
            in_flight.abort_all();
        }

        pool.close().await;
        internal!(level = INFO, "Process is exiting");

        ret
    }
}
