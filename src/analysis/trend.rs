//! Day-aligned water-level trend computation.
//!
//! Hydrological reporting compares "today against the same calendar day
//! N days ago", not a rolling 24×N-hour lookback. A late-evening
//! reading must never be averaged together with readings from a
//! neighboring calendar date. Two timestamps are comparable for trend
//! purposes iff their UTC calendar dates are equal, independent of
//! time-of-day.
//!
//! # Clock injection
//! Nothing here calls `Utc::now()`; the reference point is always the
//! latest reading of the input itself, so the computation is purely
//! deterministic in tests.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::model::{Trend, TrendError, WaterLevelCollection, WaterLevelReading, UNIT_CM};

/// Trend horizons in days, ascending.
const HORIZONS: [i64; 3] = [1, 3, 7];

// ---------------------------------------------------------------------------
// Trend computation
// ---------------------------------------------------------------------------

/// Computes P1D/P3D/P7D deltas from a list of readings.
///
/// The readings are assumed pre-sorted ascending by timestamp; the last
/// element is the reference point. An empty input fails with
/// `EmptyCollection`; a horizon with no same-day comparison data is
/// reported as `None` rather than failing the whole computation.
pub fn calculate_trends(readings: &[WaterLevelReading]) -> Result<Trend, TrendError> {
    let latest = readings.last().ok_or(TrendError::EmptyCollection)?;
    let latest_date = utc_date(&latest.timestamp)?;

    let mut deltas: [Option<WaterLevelReading>; 3] = [None, None, None];
    for (slot, days) in HORIZONS.iter().enumerate() {
        match delta_for_horizon(readings, latest, latest_date, *days) {
            Ok(delta) => deltas[slot] = Some(delta),
            Err(TrendError::NoDataForHorizon(_)) => deltas[slot] = None,
            Err(err) => return Err(err),
        }
    }

    let [p1d, p3d, p7d] = deltas;
    Ok(Trend { p1d, p3d, p7d })
}

/// Delta between `latest` and the same-day average `days` calendar days
/// earlier. The comparison value is the arithmetic mean of every
/// reading whose UTC date equals the target date.
fn delta_for_horizon(
    readings: &[WaterLevelReading],
    latest: &WaterLevelReading,
    latest_date: NaiveDate,
    days: i64,
) -> Result<WaterLevelReading, TrendError> {
    let target_date = latest_date - Duration::days(days);
    let comparison = same_day_average(readings, target_date)?;
    let delta = latest.difference(&comparison)?;

    // Stamp the delta with the day it was compared against.
    Ok(WaterLevelReading {
        timestamp: comparison.timestamp,
        value: delta.value,
        unit: delta.unit,
    })
}

/// Averages every reading falling on `target_date` (UTC), returning a
/// synthetic reading stamped at midnight of that day.
///
/// Fails with `NoDataForHorizon` when no reading matches, and with
/// `UnitMismatch` when the matching readings do not agree on a unit.
fn same_day_average(
    readings: &[WaterLevelReading],
    target_date: NaiveDate,
) -> Result<WaterLevelReading, TrendError> {
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    let mut unit: Option<&str> = None;

    for reading in readings {
        if utc_date(&reading.timestamp)? != target_date {
            continue;
        }

        match unit {
            None => unit = Some(&reading.unit),
            Some(u) if u != reading.unit => {
                return Err(TrendError::UnitMismatch {
                    left: u.to_string(),
                    right: reading.unit.clone(),
                });
            }
            Some(_) => {}
        }

        sum += reading.value;
        count += 1;
    }

    if count == 0 {
        return Err(TrendError::NoDataForHorizon(target_date.to_string()));
    }

    let midnight = target_date.and_time(NaiveTime::MIN).and_utc();

    Ok(WaterLevelReading {
        timestamp: midnight.to_rfc3339(),
        value: sum / count as f64,
        unit: unit.unwrap_or_default().to_string(),
    })
}

/// UTC calendar date of an RFC 3339 timestamp. Offsets are normalized
/// to UTC before the date is taken, so "same day" means the same UTC
/// day everywhere.
fn utc_date(timestamp: &str) -> Result<NaiveDate, TrendError> {
    let dt = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| TrendError::TimestampParse(timestamp.to_string()))?;
    Ok(dt.with_timezone(&Utc).date_naive())
}

// ---------------------------------------------------------------------------
// Collection augmentation
// ---------------------------------------------------------------------------

/// Augments a freshly fetched collection with its unit, latest reading
/// and trend deltas.
///
/// A trend failure is reported to the caller but does not clear the
/// latest reading; read paths simply omit the trend field when no
/// history exists.
pub fn augment_collection(collection: &mut WaterLevelCollection) -> Result<(), TrendError> {
    if collection.unit.is_empty() {
        collection.unit = UNIT_CM.to_string();
    }

    // readings arrive without a per-entry unit; stamp them before any
    // subtraction so the unit check has something to compare
    let unit = collection.unit.clone();
    for reading in &mut collection.measurements {
        if reading.unit.is_empty() {
            reading.unit = unit.clone();
        }
    }

    let latest = collection.latest_measurement().cloned();
    collection.latest = latest;
    collection.trend = Some(calculate_trends(&collection.measurements)?);
    Ok(())
}

/// Converts persisted samples back into provider-shaped readings so
/// trends can be computed over a stored timeseries. Sample order is
/// preserved, which keeps the ascending contract intact.
pub fn readings_from_timeseries(timeseries: &crate::measurement::Timeseries) -> Vec<WaterLevelReading> {
    let unit = timeseries
        .measurement
        .as_ref()
        .map(|m| m.unit.clone())
        .unwrap_or_else(|| UNIT_CM.to_string());

    timeseries
        .samples
        .iter()
        .filter_map(|sample| {
            let dt = DateTime::<Utc>::from_timestamp(sample.timestamp, 0)?;
            Some(WaterLevelReading {
                timestamp: dt.to_rfc3339(),
                value: sample.value,
                unit: unit.clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
