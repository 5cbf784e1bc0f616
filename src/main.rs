//! ==============================================================================
//! main.rs - sensor bridge entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load configuration (bridge.toml + environment)
//!     - open the sqlite store
//!     - start the ingestion worker and the mqtt event loop
//!     - serve the http api until ctrl-c / sigterm
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                     sensor-bridge process                   │
//!     │  ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐   │
//!     │  │ mqtt loop   │──>│ ingest worker│   │ web server      │   │
//!     │  │ (rumqttc)   │   │ (queue drain)│   │ (port 3000)     │   │
//!     │  └─────────────┘   └──────┬───────┘   └────────┬────────┘   │
//!     │                           │                    │            │
//!     │                    ┌──────┴────────────────────┴──────┐     │
//!     │                    │  LatestCache  +  Store (sqlite)  │     │
//!     │                    └──────────────────────────────────┘     │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use sensor_bridge::api::{self, ApiState};
use sensor_bridge::cache::LatestCache;
use sensor_bridge::config::BridgeConfig;
use sensor_bridge::ingest::{IngestQueue, Ingestor};
use sensor_bridge::mqtt::{self, MqttPublisher};
use sensor_bridge::pump::CommandRelay;
use sensor_bridge::query::QueryService;
use sensor_bridge::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Sensor Bridge");
    println!("  MQTT telemetry -> SQLite -> HTTP");
    println!("===========================================================");

    // step 1: load configuration
    let config = BridgeConfig::load_or_default();
    config.print_summary();
    sensor_bridge::init_tracing(&config.logging.level);

    // step 2: open the store
    let store = match Store::connect(&config.database).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, url = %config.database.url, "Fatal: cannot open store");
            return Err(e.into());
        }
    };

    // step 3: shared latest-reading cache
    let cache = LatestCache::new();

    // step 4: ingestion worker
    let (queue, rx) = IngestQueue::channel(config.ingest.queue_capacity);
    let ingestor = Ingestor::new(cache.clone(), store.clone())
        .show_sensor_data(config.logging.show_sensor_data);
    let worker = tokio::spawn(ingestor.run(rx));

    // step 5: broker session; the queue's only sender lives in this task
    let (client, eventloop) = mqtt::connect(&config.mqtt);
    let mqtt_task = tokio::spawn(mqtt::run_event_loop(
        client.clone(),
        eventloop,
        config.mqtt.clone(),
        queue,
    ));

    // step 6: http api in the foreground
    let state = ApiState {
        queries: QueryService::new(cache, store.clone(), config.query),
        relay: CommandRelay::new(
            Arc::new(MqttPublisher::new(client)),
            config.mqtt.command_topic.clone(),
        ),
    };
    let served = api::serve(&config.listen_addr(), state, shutdown_signal()).await;
    if let Err(e) = &served {
        error!(error = %e, "Web server error");
    }

    // teardown: stopping the mqtt task drops the queue, the worker drains and exits
    mqtt_task.abort();
    let _ = worker.await;
    store.close().await;
    info!("Bridge stopped");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested");
}
