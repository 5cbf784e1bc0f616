//! ==============================================================================
//! mqtt.rs - broker transport (rumqttc)
//! ==============================================================================
//!
//! purpose:
//!     keeps one mqtt session to the broker:
//!     - subscribes to the telemetry topic on every (re)connect
//!     - forwards telemetry payloads into the ingestion queue
//!     - publishes pump commands on behalf of pump.rs
//!
//! reconnects are rumqttc's job: after an error the next poll() dials again.
//! we only log and wait `reconnect_delay_seconds` in between.
//!
//! ==============================================================================

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::ingest::IngestQueue;
use crate::pump::CommandPublisher;

/// floor for the keep-alive interval
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// pending requests the client buffers before try_publish starts failing
const REQUEST_CAPACITY: usize = 64;

pub fn options(config: &MqttConfig) -> MqttOptions {
    let client_id = format!("{}-{}", config.client_id, std::process::id());
    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(
        config.keep_alive_seconds.max(MIN_KEEP_ALIVE_SECS),
    ));
    options.set_clean_session(true);
    options
}

pub fn connect(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    AsyncClient::new(options(config), REQUEST_CAPACITY)
}

/// drive the event loop forever, feeding telemetry into `queue`
pub async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: MqttConfig,
    queue: IngestQueue,
) {
    let reconnect_delay = Duration::from_secs(config.reconnect_delay_seconds);
    let topic = config.telemetry_topic;
    let mut subscription = Subscription::new(topic.clone());

    loop {
        // a subscribe the request queue refused last time goes out now
        subscription.retry(&client);

        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(host = %config.host, port = config.port, "Connected to MQTT broker");
                // clean session: the subscription has to be renewed on every connect
                subscription.request();
                subscription.retry(&client);
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                info!(%topic, "Subscribed to telemetry topic");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic == topic {
                    queue.offer(publish.payload);
                } else {
                    debug!(topic = %publish.topic, "Ignoring message on unexpected topic");
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    error = %e,
                    retry_in_secs = reconnect_delay.as_secs(),
                    "MQTT connection error"
                );
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

// ==============================================================================
// subscription - telemetry subscribe that survives a full request queue
// ==============================================================================
// awaiting `client.subscribe` inside the loop would deadlock once the request
// queue is full, since only `poll()` drains it. the request stays pending and
// is tried again on every pass through the loop instead.

struct Subscription {
    topic: String,
    pending: bool,
}

impl Subscription {
    fn new(topic: String) -> Self {
        Self {
            topic,
            pending: false,
        }
    }

    /// mark the subscription as owed to the broker
    fn request(&mut self) {
        self.pending = true;
    }

    fn retry(&mut self, client: &AsyncClient) {
        if !self.pending {
            return;
        }
        match client.try_subscribe(self.topic.clone(), QoS::AtMostOnce) {
            Ok(()) => self.pending = false,
            Err(e) => warn!(error = %e, topic = %self.topic, "Subscribe not queued, retrying"),
        }
    }
}

// ==============================================================================
// publisher - CommandPublisher over the shared client
// ==============================================================================

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl CommandPublisher for MqttPublisher {
    /// qos 0, not retained; never waits on the network
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }
}
