//! ==============================================================================
//! sensor-bridge - mqtt telemetry to sqlite, served over http
//! ==============================================================================
//!
//! architecture:
//!
//! ```text
//!     device ──iot/sensor──> mqtt.rs ──IngestQueue──> ingest.rs ──┬──> cache.rs
//!                                                                  └──> store.rs
//!
//!     client ──http──> api.rs ──> query.rs ──> cache.rs | store.rs
//!                        │
//!                        └──> pump.rs ──iot/pompa──> device
//! ```
//!
//! the cache is the only in-process mutable state shared between the
//! ingestion worker and the http handlers. the store owns the history.
//!
//! ==============================================================================

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod mqtt;
pub mod pump;
pub mod query;
pub mod store;
pub mod telemetry;

use tracing_subscriber::EnvFilter;

/// install the fmt subscriber; RUST_LOG wins over `level`
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
