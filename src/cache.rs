//! ==============================================================================
//! cache.rs - latest-reading cache
//! ==============================================================================
//!
//! a single slot holding the newest ingested reading, shared between:
//! - the ingestion worker (writes)
//! - the http handlers (reads)
//!
//! arc<rwlock<>> like the rest of the shared state. the timestamp is taken
//! while the write lock is held, so whoever writes last also carries the
//! latest recorded_at.
//!
//! ==============================================================================

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{LatestReading, Measurement};

#[derive(Clone, Default)]
pub struct LatestCache {
    slot: Arc<RwLock<Option<LatestReading>>>,
}

impl LatestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// stamp `measurement` with the current time and make it the latest reading
    pub async fn record(&self, measurement: Measurement) -> LatestReading {
        let mut slot = self.slot.write().await;
        let reading = LatestReading::new(measurement, Utc::now());
        *slot = Some(reading);
        reading
    }

    /// `None` until the first reading arrives
    pub async fn get(&self) -> Option<LatestReading> {
        *self.slot.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(t: f64) -> Measurement {
        Measurement {
            temperature: t,
            humidity: 50.0,
            light: 100.0,
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        assert_eq!(LatestCache::new().get().await, None);
    }

    #[tokio::test]
    async fn record_replaces_previous_value() {
        let cache = LatestCache::new();
        cache.record(m(20.0)).await;
        let second = cache.record(m(30.0)).await;

        let latest = cache.get().await.unwrap();
        assert_eq!(latest, second);
        assert_eq!(latest.measurement(), m(30.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_leave_the_newest_stamp() {
        let cache = LatestCache::new();
        let mut tasks = Vec::new();
        for i in 0..64 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.record(m(i as f64)).await }));
        }

        let mut written = Vec::new();
        for task in tasks {
            written.push(task.await.unwrap());
        }

        let newest = written.iter().map(|r| r.recorded_at).max().unwrap();
        let latest = cache.get().await.unwrap();
        assert_eq!(latest.recorded_at, newest);
        assert!(written.contains(&latest));
    }
}
