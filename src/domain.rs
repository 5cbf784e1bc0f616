//! ==============================================================================
//! domain.rs - reading, summary and command types
//! ==============================================================================
//!
//! purpose:
//!     the value types shared by every stage of the bridge. the wire names
//!     used by the http api live here as serde attributes.
//!
//! relationships:
//!     - produced by: telemetry.rs (Measurement), store.rs (Reading)
//!     - held by: cache.rs (LatestReading)
//!     - served by: query.rs / api.rs (Summary, RecentReadings)
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// one decoded observation, before the server has stamped it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (%)
    pub humidity: f64,
    /// light level as reported by the device
    pub light: f64,
}

/// contents of the latest-reading cache
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatestReading {
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    /// server-received time
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

impl LatestReading {
    pub fn new(measurement: Measurement, recorded_at: DateTime<Utc>) -> Self {
        Self {
            temperature: measurement.temperature,
            humidity: measurement.humidity,
            light: measurement.light,
            recorded_at,
        }
    }

    pub fn measurement(&self) -> Measurement {
        Measurement {
            temperature: self.temperature,
            humidity: self.humidity,
            light: self.light,
        }
    }
}

/// a persisted row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub id: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

/// body of GET /api/sensor/all
#[derive(Clone, Debug, Serialize)]
pub struct RecentReadings {
    pub count: usize,
    pub data: Vec<Reading>,
}

impl From<Vec<Reading>> for RecentReadings {
    fn from(data: Vec<Reading>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// store-side aggregate over the whole history
///
/// every field is `None` when the table is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawStats {
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub max_humidity: Option<f64>,
    pub rows: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremeMonth {
    /// `M-YYYY`, e.g. `3-2025`
    pub month_year: String,
}

/// body of GET /api/sensor/summary
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_temp: f64,
    pub max_humidity: Option<f64>,
    pub extreme_records: Vec<Reading>,
    pub extreme_months: Vec<ExtremeMonth>,
}

// ==============================================================================
// pump command
// ==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PumpCommand {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl PumpCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PumpCommand {
    type Err = ValidationError;

    /// exact match only: "on" or " ON" are rejected like the device would
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            _ => Err(ValidationError::PumpStatus),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_command_parses_exact_literals_only() {
        assert_eq!("ON".parse::<PumpCommand>().unwrap(), PumpCommand::On);
        assert_eq!("OFF".parse::<PumpCommand>().unwrap(), PumpCommand::Off);
        for bad in ["on", "Off", " ON", "MAYBE", ""] {
            assert!(bad.parse::<PumpCommand>().is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn summary_uses_camel_case_wire_names() {
        let summary = Summary {
            max_temp: Some(30.0),
            min_temp: Some(10.0),
            avg_temp: 20.0,
            max_humidity: Some(60.0),
            extreme_records: Vec::new(),
            extreme_months: vec![ExtremeMonth {
                month_year: "3-2025".into(),
            }],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["maxTemp"], 30.0);
        assert_eq!(json["maxHumidity"], 60.0);
        assert_eq!(json["extremeMonths"][0]["monthYear"], "3-2025");
        assert!(json["extremeRecords"].as_array().unwrap().is_empty());
    }
}
