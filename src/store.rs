/// The sample store contract and its in-memory implementation.
///
/// `MeasurementStore` is the durable mapping from (series name,
/// timestamp) to a value. The critical correctness property is the
/// idempotent merge in `add_timeseries`: re-ingesting the same provider
/// window must never create duplicate rows or double-count values.
/// `db::PgStore` is the production backend; `MemoryStore` backs trigger
/// dry-runs and tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::cancel::CancelToken;
use crate::measurement::{Measurement, Sample, Timeseries};
use crate::period::{Epoch, Period};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    /// The backing store is not reachable or not initialized.
    NotReady,
    /// A measurement with this name already exists (unique constraint).
    /// Benign when two callers race on create-if-absent.
    DuplicateName(String),
    /// A timeseries was handed over without its measurement metadata.
    MissingMetadata(String),
    /// Connectivity or query failure, with series/timestamp context
    /// attached for diagnosis. Fatal for the current operation; the
    /// store never retries internally.
    Connectivity(String),
    /// The operation was cancelled mid-loop. Already-inserted samples
    /// remain and stay deduplicated on retry.
    Cancelled,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotReady => write!(f, "sample store is not available"),
            StoreError::DuplicateName(name) => {
                write!(f, "measurement already exists: {}", name)
            }
            StoreError::MissingMetadata(name) => {
                write!(f, "timeseries {} carries no measurement metadata", name)
            }
            StoreError::Connectivity(msg) => write!(f, "store error: {}", msg),
            StoreError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

pub trait MeasurementStore {
    /// Inserts series metadata. Fails with `DuplicateName` when the
    /// unique-name constraint is violated, never silently overwrites.
    fn add_measurement(&mut self, measurement: &Measurement) -> Result<(), StoreError>;

    /// Ensures the measurement exists (create-if-absent by name), then
    /// inserts every sample, skipping `(measurement_id, timestamp)`
    /// pairs already present. Not transactional across samples; partial
    /// success on error is acceptable because retries stay deduplicated.
    fn add_timeseries(
        &mut self,
        cancel: &CancelToken,
        timeseries: &Timeseries,
    ) -> Result<(), StoreError>;

    /// Returns `Ok(None)` when the series has never been created, a
    /// missing series is not an error. Samples come back ascending by
    /// timestamp, restricted to `[period.start, period.end]` inclusive.
    fn get_timeseries(
        &mut self,
        measurement_name: &str,
        period: Period,
    ) -> Result<Option<Timeseries>, StoreError>;

    /// All known measurements, ordered by name.
    fn get_measurements(&mut self) -> Result<Vec<Measurement>, StoreError>;

    fn is_ready(&self) -> bool;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// HashMap-per-series store. Samples live in a `BTreeMap` keyed by
/// epoch timestamp, which gives both the exact-timestamp dedup and the
/// ascending-order read contract by construction.
pub struct MemoryStore {
    series: Mutex<HashMap<String, SeriesEntry>>,
    next_id: Mutex<i64>,
}

struct SeriesEntry {
    measurement: Measurement,
    samples: std::collections::BTreeMap<Epoch, Sample>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            series: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Total persisted samples for one series; used by idempotency tests.
    pub fn sample_count(&self, measurement_name: &str) -> usize {
        self.series
            .lock()
            .unwrap()
            .get(measurement_name)
            .map(|entry| entry.samples.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MeasurementStore for MemoryStore {
    fn add_measurement(&mut self, measurement: &Measurement) -> Result<(), StoreError> {
        let mut series = self.series.lock().unwrap();
        if series.contains_key(&measurement.name) {
            return Err(StoreError::DuplicateName(measurement.name.clone()));
        }

        let mut stored = measurement.clone();
        stored.id = {
            let mut guard = self.next_id.lock().unwrap();
            let id = *guard;
            *guard += 1;
            id
        };
        series.insert(
            stored.name.clone(),
            SeriesEntry {
                measurement: stored,
                samples: std::collections::BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn add_timeseries(
        &mut self,
        cancel: &CancelToken,
        timeseries: &Timeseries,
    ) -> Result<(), StoreError> {
        if !self
            .series
            .lock()
            .unwrap()
            .contains_key(&timeseries.name)
        {
            let measurement = timeseries
                .measurement
                .as_ref()
                .ok_or_else(|| StoreError::MissingMetadata(timeseries.name.clone()))?;
            self.add_measurement(measurement)?;
        }

        let mut series = self.series.lock().unwrap();
        let entry = series
            .get_mut(&timeseries.name)
            .ok_or_else(|| StoreError::MissingMetadata(timeseries.name.clone()))?;
        let measurement_id = entry.measurement.id;

        for sample in &timeseries.samples {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            // exact-timestamp dedup: repeats are no-ops
            if entry.samples.contains_key(&sample.timestamp) {
                continue;
            }

            let mut stored = sample.clone();
            stored.measurement_id = measurement_id;
            stored.id = {
                let mut guard = self.next_id.lock().unwrap();
                let id = *guard;
                *guard += 1;
                id
            };
            entry.samples.insert(sample.timestamp, stored);
        }

        Ok(())
    }

    fn get_timeseries(
        &mut self,
        measurement_name: &str,
        period: Period,
    ) -> Result<Option<Timeseries>, StoreError> {
        let series = self.series.lock().unwrap();
        let entry = match series.get(measurement_name) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        // inverted window selects nothing, matching the SQL predicate
        let samples: Vec<Sample> = if period.start > period.end {
            Vec::new()
        } else {
            entry
                .samples
                .range(period.start..=period.end)
                .map(|(_, sample)| sample.clone())
                .collect()
        };

        Ok(Some(Timeseries {
            name: entry.measurement.name.clone(),
            samples,
            start: period.start,
            end: period.end,
            measurement: Some(entry.measurement.clone()),
        }))
    }

    fn get_measurements(&mut self) -> Result<Vec<Measurement>, StoreError> {
        let series = self.series.lock().unwrap();
        let mut measurements: Vec<Measurement> = series
            .values()
            .map(|entry| entry.measurement.clone())
            .collect();
        measurements.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(measurements)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
