//! ==============================================================================
//! telemetry.rs - decoder for iot/sensor payloads
//! ==============================================================================
//!
//! the device publishes json like:
//!
//! ```text
//!     {"suhu": 25.5, "kelembapan": 60, "cahaya": "812"}
//! ```
//!
//! each field may be a json number or a numeric string. a payload with any
//! field missing or unusable is rejected whole, never partially recorded.
//!
//! ==============================================================================

use serde_json::{Map, Value};

use crate::domain::Measurement;
use crate::error::DecodeError;

pub const FIELD_TEMPERATURE: &str = "suhu";
pub const FIELD_HUMIDITY: &str = "kelembapan";
pub const FIELD_LIGHT: &str = "cahaya";

/// decode one raw telemetry payload
pub fn decode(payload: &[u8]) -> Result<Measurement, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    Ok(Measurement {
        temperature: numeric_field(object, FIELD_TEMPERATURE)?,
        humidity: numeric_field(object, FIELD_HUMIDITY)?,
        light: numeric_field(object, FIELD_LIGHT)?,
    })
}

fn numeric_field(object: &Map<String, Value>, field: &'static str) -> Result<f64, DecodeError> {
    let raw = object.get(field).ok_or(DecodeError::MissingField(field))?;

    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| DecodeError::NotNumeric {
        field,
        value: raw.to_string(),
    })?;

    // "NaN" and "inf" parse fine as f64 strings
    if !number.is_finite() {
        return Err(DecodeError::NotFinite(field));
    }
    Ok(number)
}
