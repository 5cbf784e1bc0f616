//! ==============================================================================
//! ingest.rs - telemetry ingestion pipeline
//! ==============================================================================
//!
//! purpose:
//!     turns raw iot/sensor payloads into cache updates and stored rows.
//!
//! flow per message:
//!
//! ```text
//!     payload ─> telemetry::decode ─> LatestCache::record ─> Store::append
//!                     │                                          │
//!                     └── DecodeError (warn, drop)               └── StorageError (error, drop)
//! ```
//!
//! the cache and the store are two independent effects; a storage failure
//! leaves the cache one reading ahead of the table. nothing is retried.
//!
//! relationships:
//!     - fed by: mqtt.rs (through IngestQueue)
//!     - writes: cache.rs, store.rs
//!
//! ==============================================================================

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::cache::LatestCache;
use crate::error::IngestError;
use crate::store::Store;
use crate::telemetry;

#[derive(Clone)]
pub struct Ingestor {
    cache: LatestCache,
    store: Store,
    show_sensor_data: bool,
}

impl Ingestor {
    pub fn new(cache: LatestCache, store: Store) -> Self {
        Self {
            cache,
            store,
            show_sensor_data: false,
        }
    }

    /// log every stored reading at info level
    pub fn show_sensor_data(mut self, enabled: bool) -> Self {
        self.show_sensor_data = enabled;
        self
    }

    /// decode, cache and persist one payload; returns the new row id
    pub async fn ingest(&self, payload: &[u8]) -> Result<i64, IngestError> {
        let measurement = telemetry::decode(payload)?;
        let latest = self.cache.record(measurement).await;
        let id = self.store.append(&measurement, Some(latest.recorded_at)).await?;

        if self.show_sensor_data {
            info!(
                id,
                temperature = measurement.temperature,
                humidity = measurement.humidity,
                light = measurement.light,
                "Reading stored"
            );
        }
        Ok(id)
    }

    /// drain the queue in arrival order until every sender is gone
    pub async fn run(self, mut rx: mpsc::Receiver<Bytes>) {
        info!("Ingestion worker started");
        while let Some(payload) = rx.recv().await {
            debug!(bytes = payload.len(), "Telemetry received");
            match self.ingest(&payload).await {
                Ok(_) => {}
                Err(IngestError::Decode(e)) => {
                    warn!(error = %e, payload = %String::from_utf8_lossy(&payload), "Telemetry rejected");
                }
                Err(IngestError::Storage(e)) => {
                    error!(error = %e, "Reading dropped, store unavailable");
                }
            }
        }
        info!("Ingestion worker stopped");
    }
}

// ==============================================================================
// hand-off queue
// ==============================================================================
// the mqtt event loop must keep polling while the store is slow, so payloads
// go through a bounded channel. a full channel drops the payload instead of
// growing without limit.

#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<Bytes>,
}

impl IngestQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// returns false when the payload was dropped
    pub fn offer(&self, payload: Bytes) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Ingestion queue full, telemetry dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Ingestion worker gone, telemetry dropped");
                false
            }
        }
    }
}
