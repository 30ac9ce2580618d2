/// Core data types for the water-level aggregation service.
///
/// This module defines the shared domain model imported by all other
/// modules. It contains no I/O, only types, their invariants, and the
/// error taxonomy for the trend and provider layers.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Units and defaults
// ---------------------------------------------------------------------------

/// PegelOnline reports gauge readings in centimeters.
pub const UNIT_CM: &str = "cm";

/// Default lookback window when a caller does not supply one.
pub const DEFAULT_TIME_PERIOD: &str = "P10D";

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// A single provider-sourced water-level reading.
///
/// `timestamp` stays in the provider's RFC 3339 wire form until the
/// merge step converts it to epoch seconds; a malformed timestamp must
/// abort ingestion there, not be silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLevelReading {
    pub timestamp: String,
    pub value: f64,
    /// Absent in the provider payload; filled from the collection unit.
    #[serde(default)]
    pub unit: String,
}

impl WaterLevelReading {
    pub fn new(timestamp: &str, value: f64, unit: &str) -> Self {
        WaterLevelReading {
            timestamp: timestamp.to_string(),
            value,
            unit: unit.to_string(),
        }
    }

    /// Signed delta between this reading and `previous`, stamped with
    /// this reading's timestamp.
    ///
    /// Both sides always share a unit when they come from the same
    /// series; a mismatch indicates upstream corruption and is surfaced
    /// as a hard error rather than a silent subtraction.
    pub fn difference(&self, previous: &WaterLevelReading) -> Result<WaterLevelReading, TrendError> {
        if self.unit != previous.unit {
            return Err(TrendError::UnitMismatch {
                left: self.unit.clone(),
                right: previous.unit.clone(),
            });
        }

        Ok(WaterLevelReading {
            timestamp: self.timestamp.clone(),
            value: self.value - previous.value,
            unit: self.unit.clone(),
        })
    }
}

/// Period-over-period water-level deltas, one per supported horizon.
///
/// A horizon is `None` when no comparison data exists for that calendar
/// day; partial trends are normal for short histories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub p1d: Option<WaterLevelReading>,
    pub p3d: Option<WaterLevelReading>,
    pub p7d: Option<WaterLevelReading>,
}

/// All readings for one station over the active window, augmented on
/// read with the latest value and trend deltas.
///
/// Invariant: `measurements` is ascending by timestamp (the provider
/// returns it that way; `latest_measurement` relies on it and ordering
/// is not re-validated here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterLevelCollection {
    pub station_id: String,
    pub start: String,
    pub end: String,
    pub measurements: Vec<WaterLevelReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<WaterLevelReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    pub unit: String,
}

impl WaterLevelCollection {
    pub fn new(station_id: &str, start: &str, measurements: Vec<WaterLevelReading>) -> Self {
        WaterLevelCollection {
            station_id: station_id.to_string(),
            start: start.to_string(),
            end: String::new(),
            measurements,
            latest: None,
            trend: None,
            unit: String::new(),
        }
    }

    /// Last element of the (ascending) measurement list.
    pub fn latest_measurement(&self) -> Option<&WaterLevelReading> {
        self.measurements.last()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from the trend computation.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendError {
    /// The collection has no readings at all; no trend object can be
    /// built (stricter than a per-horizon absence).
    EmptyCollection,
    /// No reading falls on the target calendar day for one horizon.
    /// Callers treat this as "trend unavailable", not a failure.
    NoDataForHorizon(String),
    /// The two sides of a subtraction carry different units.
    UnitMismatch { left: String, right: String },
    /// A reading's timestamp could not be parsed as RFC 3339.
    TimestampParse(String),
}

impl fmt::Display for TrendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendError::EmptyCollection => {
                write!(f, "cannot compute trends over an empty collection")
            }
            TrendError::NoDataForHorizon(date) => {
                write!(f, "no comparison data for calendar day {}", date)
            }
            TrendError::UnitMismatch { left, right } => {
                write!(f, "unit mismatch: {} vs {}", left, right)
            }
            TrendError::TimestampParse(ts) => {
                write!(f, "unparseable reading timestamp: {}", ts)
            }
        }
    }
}

impl std::error::Error for TrendError {}

/// Errors from the external water-level provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Non-2xx HTTP response from the provider.
    HttpError(u16),
    /// The requested resource does not exist upstream.
    NotFound(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The response was empty or contained no usable entries.
    NoContent(String),
    /// The station identifier is empty or malformed.
    InvalidStationId,
    /// Transport-level failure (DNS, TLS, timeout).
    Transport(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(code) => write!(f, "provider HTTP error: {}", code),
            ProviderError::NotFound(what) => write!(f, "provider resource not found: {}", what),
            ProviderError::ParseError(msg) => write!(f, "provider parse error: {}", msg),
            ProviderError::NoContent(what) => write!(f, "no content available: {}", what),
            ProviderError::InvalidStationId => write!(f, "invalid station ID provided"),
            ProviderError::Transport(msg) => write!(f, "provider transport error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difference_increase() {
        let current = WaterLevelReading::new("2023-10-01T12:00:00Z", 10.0, "cm");
        let previous = WaterLevelReading::new("2023-10-01T11:00:00Z", 5.0, "cm");

        let delta = current.difference(&previous).unwrap();
        assert_eq!(delta.value, 5.0);
        assert_eq!(delta.unit, "cm");
        assert_eq!(delta.timestamp, "2023-10-01T12:00:00Z");
    }

    #[test]
    fn test_difference_decrease_and_no_change() {
        let current = WaterLevelReading::new("2023-10-01T12:00:00Z", 7.0, "cm");
        let previous = WaterLevelReading::new("2023-10-01T11:00:00Z", 10.0, "cm");
        assert_eq!(current.difference(&previous).unwrap().value, -3.0);

        let same = WaterLevelReading::new("2023-10-01T11:00:00Z", 7.0, "cm");
        assert_eq!(current.difference(&same).unwrap().value, 0.0);
    }

    #[test]
    fn test_difference_unit_mismatch() {
        let current = WaterLevelReading::new("2023-10-01T12:00:00Z", 10.0, "cm");
        let previous = WaterLevelReading::new("2023-10-01T11:00:00Z", 5.0, "m");

        match current.difference(&previous) {
            Err(TrendError::UnitMismatch { left, right }) => {
                assert_eq!(left, "cm");
                assert_eq!(right, "m");
            }
            other => panic!("expected UnitMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_latest_measurement_is_last_element() {
        let collection = WaterLevelCollection::new(
            "rhein-mannheim",
            "P10D",
            vec![
                WaterLevelReading::new("2023-10-01T00:00:00Z", 1.0, "cm"),
                WaterLevelReading::new("2023-10-02T00:00:00Z", 2.0, "cm"),
            ],
        );
        assert_eq!(collection.latest_measurement().unwrap().value, 2.0);

        let empty = WaterLevelCollection::new("rhein-mannheim", "P10D", vec![]);
        assert!(empty.latest_measurement().is_none());
    }
}
