//! The MQTT subscription feeding the relay.

use std::time::Duration;

use courier_common::internal;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::Deserialize;

/// Pause between reconnection attempts after the broker connection fails.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on flushing the DISCONNECT packet during shutdown.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Capacity of the request channel between the client and its event loop.
const REQUEST_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MqttConfig {
    pub host: String,

    /// Default: 1883
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Default: `email-processor`
    #[serde(default = "defaults::client_id")]
    pub client_id: String,

    pub topic: String,

    /// Default: 30 seconds
    #[serde(default = "defaults::keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl MqttConfig {
    #[must_use]
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options
    }
}

mod defaults {
    pub const fn port() -> u16 {
        1883
    }

    pub fn client_id() -> String {
        "email-processor".to_string()
    }

    pub const fn keep_alive_secs() -> u64 {
        30
    }
}

/// A QoS 1 subscription to one topic that survives broker restarts.
///
/// Nothing is sent to the broker until [`MqttSource::run`] starts polling.
pub struct MqttSource {
    client: AsyncClient,
    events: EventLoop,
    topic: String,
}

impl MqttSource {
    #[must_use]
    pub fn new(config: &MqttConfig) -> Self {
        let (client, events) = AsyncClient::new(config.options(), REQUEST_CAPACITY);

        Self {
            client,
            events,
            topic: config.topic.clone(),
        }
    }

    /// Polls the broker connection forever, passing every payload published
    /// on the topic to `on_message`.
    ///
    /// Connection failures are logged and retried after a short pause. The
    /// subscription is renewed on every CONNACK so it survives reconnects.
    pub async fn run<F>(&mut self, mut on_message: F)
    where
        F: FnMut(Vec<u8>),
    {
        loop {
            match self.events.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    internal!(level = INFO, "Connected to broker ({:?})", ack.code);
                    if let Err(e) = self.client.try_subscribe(&self.topic, QoS::AtLeastOnce) {
                        tracing::error!(topic = %self.topic, "Failed to subscribe: {e}");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    internal!(level = INFO, "Subscribed to {}", self.topic);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    on_message(publish.payload.to_vec());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Broker connection error: {e}");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Sends DISCONNECT and gives the event loop a moment to flush it.
    pub async fn disconnect(mut self) {
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!("Failed to queue broker disconnect: {e}");
            return;
        }

        let flush = async {
            loop {
                match self.events.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };

        if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
            tracing::debug!("Broker disconnect was not flushed within {DISCONNECT_TIMEOUT:?}");
        } else {
            internal!(level = INFO, "Disconnected from broker");
        }
    }
}
