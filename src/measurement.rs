/// Measurement catalog types and the provider-to-timeseries merger.
///
/// A `Measurement` is series metadata (name, unit, description); a
/// `Sample` is one (timestamp, value) observation belonging to it. A
/// `Timeseries` is the transient read-model wrapping both. It is built
/// fresh per request and never persisted as a unit.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{WaterLevelCollection, UNIT_CM};
use crate::period::{parse_rfc3339, Epoch, Period};

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// Series metadata. `name` is unique and slug-form; the row is created
/// once per distinct series and never deleted in normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub unit: String,
}

/// One observation. At most one sample exists per
/// `(measurement_id, timestamp)` pair; the store treats repeats as
/// no-ops, keyed by the exact timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub measurement_id: i64,
    pub value: f64,
    /// Epoch seconds.
    pub timestamp: Epoch,
}

/// A measurement's samples over a window, ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    pub name: String,
    pub samples: Vec<Sample>,
    pub start: Epoch,
    pub end: Epoch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
}

// ---------------------------------------------------------------------------
// Series naming
// ---------------------------------------------------------------------------

/// Joins key parts into a unique slug-form series name, e.g.
/// `measurement_name(&["waterlevel", "Rhein-Mannheim"])` →
/// `"waterlevel-rhein-mannheim"`.
pub fn measurement_name(keys: &[&str]) -> String {
    slugify(&keys.join("-"))
}

/// Lowercases and collapses everything outside `[a-z0-9]` into single
/// hyphens, trimming them from both ends.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

// ---------------------------------------------------------------------------
// Timeseries merger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum MergeError {
    /// The provider returned no readings for the station.
    EmptyInput(String),
    /// A reading's timestamp is not valid RFC 3339. The whole ingestion
    /// aborts on the first bad entry rather than partially ingesting.
    TimestampParse(String),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::EmptyInput(station) => {
                write!(f, "no water levels available for station {}", station)
            }
            MergeError::TimestampParse(t) => {
                write!(f, "unparseable measurement timestamp: {}", t)
            }
        }
    }
}

impl std::error::Error for MergeError {}

/// Converts a provider water-level collection into the internal
/// `Timeseries` representation under the given series name.
///
/// Sample IDs are left at 0; the store assigns them on insert.
pub fn build_timeseries(
    collection: &WaterLevelCollection,
    name: &str,
    period: Period,
) -> Result<Timeseries, MergeError> {
    if collection.measurements.is_empty() {
        return Err(MergeError::EmptyInput(collection.station_id.clone()));
    }

    let mut samples = Vec::with_capacity(collection.measurements.len());
    for reading in &collection.measurements {
        let timestamp = parse_rfc3339(&reading.timestamp)
            .map_err(|_| MergeError::TimestampParse(reading.timestamp.clone()))?;
        samples.push(Sample {
            id: 0,
            measurement_id: 0,
            value: reading.value,
            timestamp,
        });
    }

    Ok(Timeseries {
        name: name.to_string(),
        samples,
        start: period.start,
        end: period.end,
        measurement: Some(Measurement {
            id: 0,
            name: name.to_string(),
            description: format!(
                "Water level measurements for station {}",
                collection.station_id
            ),
            unit: UNIT_CM.to_string(),
        }),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
