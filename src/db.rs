/// PostgreSQL-backed sample store.
///
/// Schema (sql/001_base_schema.sql):
///   measurements(id, name UNIQUE, description, unit)
///   samples(id, measurement_id REFERENCES measurements ON DELETE CASCADE,
///           timestamp, value)
/// with a UNIQUE composite index on (measurement_id, timestamp). The
/// index both speeds up the dedup check / range query and closes the
/// create-if-absent race: a concurrent duplicate insert is rejected by
/// the database and treated as an idempotent skip.
///
/// Connectivity failures propagate to the caller with series/timestamp
/// context attached; there is no retry or backoff at this layer.

use postgres::error::SqlState;
use postgres::{Client, NoTls};

use crate::cancel::CancelToken;
use crate::measurement::{Measurement, Sample, Timeseries};
use crate::period::Period;
use crate::store::{MeasurementStore, StoreError};

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Tables the service expects to exist before doing any work.
pub const REQUIRED_TABLES: [&str; 2] = ["measurements", "samples"];

/// Connects using `DATABASE_URL` (loaded from the environment, with
/// `.env` honored via dotenv) and verifies the required tables exist.
pub fn connect_and_verify(required_tables: &[&str]) -> Result<Client, StoreError> {
    dotenv::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| StoreError::Connectivity("DATABASE_URL is not set".to_string()))?;

    let mut client = connect(&database_url)?;
    verify_tables(&mut client, required_tables)?;
    Ok(client)
}

pub fn connect(database_url: &str) -> Result<Client, StoreError> {
    Client::connect(database_url, NoTls)
        .map_err(|e| StoreError::Connectivity(format!("failed to connect: {}", e)))
}

fn verify_tables(client: &mut Client, required_tables: &[&str]) -> Result<(), StoreError> {
    for table in required_tables {
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_name = $1",
                &[table],
            )
            .map_err(|e| StoreError::Connectivity(format!("table check failed: {}", e)))?;

        let count: i64 = row.get(0);
        if count == 0 {
            return Err(StoreError::Connectivity(format!(
                "required table '{}' is missing; apply sql/001_base_schema.sql",
                table
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store implementation
// ---------------------------------------------------------------------------

pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        PgStore { client }
    }

    /// Opens a store against `DATABASE_URL`, verifying the schema.
    pub fn open() -> Result<Self, StoreError> {
        Ok(PgStore::new(connect_and_verify(&REQUIRED_TABLES)?))
    }

    /// Opens a store against an explicit connection string, verifying
    /// the schema.
    pub fn open_url(database_url: &str) -> Result<Self, StoreError> {
        let mut client = connect(database_url)?;
        verify_tables(&mut client, &REQUIRED_TABLES)?;
        Ok(PgStore::new(client))
    }

    fn get_measurement_by_name(&mut self, name: &str) -> Result<Option<Measurement>, StoreError> {
        let row = self
            .client
            .query_opt(
                "SELECT id, name, description, unit FROM measurements WHERE name = $1",
                &[&name],
            )
            .map_err(|e| {
                StoreError::Connectivity(format!("lookup of measurement '{}' failed: {}", name, e))
            })?;

        Ok(row.map(|row| Measurement {
            id: row.get(0),
            name: row.get(1),
            description: row.get(2),
            unit: row.get(3),
        }))
    }

    fn has_sample(&mut self, measurement_id: i64, timestamp: i64) -> Result<bool, StoreError> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*) FROM samples WHERE measurement_id = $1 AND timestamp = $2",
                &[&measurement_id, &timestamp],
            )
            .map_err(|e| {
                StoreError::Connectivity(format!(
                    "sample check failed (measurement {}, timestamp {}): {}",
                    measurement_id, timestamp, e
                ))
            })?;

        let count: i64 = row.get(0);
        Ok(count > 0)
    }

    fn add_sample(&mut self, measurement_id: i64, sample: &Sample) -> Result<(), StoreError> {
        if self.has_sample(measurement_id, sample.timestamp)? {
            // exact-timestamp dedup: re-ingestion is a no-op
            return Ok(());
        }

        let result = self.client.execute(
            "INSERT INTO samples (measurement_id, value, timestamp) VALUES ($1, $2, $3)",
            &[&measurement_id, &sample.value, &sample.timestamp],
        );

        match result {
            Ok(_) => Ok(()),
            // a concurrent ingester won the check-then-insert race; the
            // unique index keeps the row single, so this skip is benign
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Ok(()),
            Err(e) => Err(StoreError::Connectivity(format!(
                "insert failed (measurement {}, timestamp {}): {}",
                measurement_id, sample.timestamp, e
            ))),
        }
    }
}

impl MeasurementStore for PgStore {
    fn add_measurement(&mut self, measurement: &Measurement) -> Result<(), StoreError> {
        let result = self.client.execute(
            "INSERT INTO measurements (name, description, unit) VALUES ($1, $2, $3)",
            &[
                &measurement.name,
                &measurement.description,
                &measurement.unit,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(StoreError::DuplicateName(measurement.name.clone()))
            }
            Err(e) => Err(StoreError::Connectivity(format!(
                "insert of measurement '{}' failed: {}",
                measurement.name, e
            ))),
        }
    }

    fn add_timeseries(
        &mut self,
        cancel: &CancelToken,
        timeseries: &Timeseries,
    ) -> Result<(), StoreError> {
        // create-if-absent, keyed by name
        let measurement = match self.get_measurement_by_name(&timeseries.name)? {
            Some(measurement) => measurement,
            None => {
                let metadata = timeseries
                    .measurement
                    .as_ref()
                    .ok_or_else(|| StoreError::MissingMetadata(timeseries.name.clone()))?;
                match self.add_measurement(metadata) {
                    Ok(()) | Err(StoreError::DuplicateName(_)) => {}
                    Err(e) => return Err(e),
                }
                self.get_measurement_by_name(&timeseries.name)?
                    .ok_or_else(|| {
                        StoreError::Connectivity(format!(
                            "measurement '{}' not found after insert",
                            timeseries.name
                        ))
                    })?
            }
        };

        for sample in &timeseries.samples {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            self.add_sample(measurement.id, sample)?;
        }

        Ok(())
    }

    fn get_timeseries(
        &mut self,
        measurement_name: &str,
        period: Period,
    ) -> Result<Option<Timeseries>, StoreError> {
        let measurement = match self.get_measurement_by_name(measurement_name)? {
            Some(measurement) => measurement,
            None => return Ok(None),
        };

        // period bounds applied server-side; the composite index on
        // (measurement_id, timestamp) serves this query directly
        let rows = self
            .client
            .query(
                "SELECT id, measurement_id, value, timestamp FROM samples \
                 WHERE measurement_id = $1 AND timestamp >= $2 AND timestamp <= $3 \
                 ORDER BY timestamp ASC",
                &[&measurement.id, &period.start, &period.end],
            )
            .map_err(|e| {
                StoreError::Connectivity(format!(
                    "sample query failed for '{}': {}",
                    measurement_name, e
                ))
            })?;

        let samples = rows
            .iter()
            .map(|row| Sample {
                id: row.get(0),
                measurement_id: row.get(1),
                value: row.get(2),
                timestamp: row.get(3),
            })
            .collect();

        Ok(Some(Timeseries {
            name: measurement.name.clone(),
            samples,
            start: period.start,
            end: period.end,
            measurement: Some(measurement),
        }))
    }

    fn get_measurements(&mut self) -> Result<Vec<Measurement>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id, name, description, unit FROM measurements ORDER BY name",
                &[],
            )
            .map_err(|e| StoreError::Connectivity(format!("measurement query failed: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| Measurement {
                id: row.get(0),
                name: row.get(1),
                description: row.get(2),
                unit: row.get(3),
            })
            .collect())
    }

    fn is_ready(&self) -> bool {
        !self.client.is_closed()
    }
}
