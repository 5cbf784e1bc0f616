//! ==============================================================================
//! error.rs - failure taxonomy
//! ==============================================================================
//!
//! purpose:
//!     one enum per kind of failure the bridge distinguishes:
//!     - DecodeError: bad telemetry payload (logged and dropped)
//!     - ValidationError: bad client input (4xx)
//!     - StorageError: store unreachable or query failed (5xx)
//!     - TransportError: broker side could not take the message
//!
//! the http mapping lives in api.rs, not here.
//!
//! ==============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not a json object")]
    NotAnObject,

    #[error("field `{0}` is missing")]
    MissingField(&'static str),

    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric {
        field: &'static str,
        value: String,
    },

    #[error("field `{0}` is not a finite number")]
    NotFinite(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid status. Use 'ON' or 'OFF'")]
    PumpStatus,

    #[error("Invalid request body: {0}")]
    Body(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client rejected the publish: {0}")]
    Publish(#[from] rumqttc::ClientError),

    #[error("command channel closed")]
    Closed,
}

/// why a single telemetry message did not make it into the store
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
