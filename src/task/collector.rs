/// Water-level collection task.
///
/// One run per station: resolve the station from the repository,
/// fetch its water levels from the provider, convert them into a
/// timeseries named `waterlevel-<station-id>`, and hand the result to
/// the sample store. The store's idempotent merge makes overlapping
/// provider windows safe to re-ingest on every trigger.

use crate::cancel::CancelToken;
use crate::ingest::StationProvider;
use crate::logging::{self, DataSource};
use crate::measurement::{build_timeseries, measurement_name};
use crate::period::Period;
use crate::stations::StationRepository;
use crate::store::MeasurementStore;

use super::TaskError;

/// What a single collection run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Samples were handed to the store (duplicates skipped there).
    Stored { samples: usize },
    /// The station is disabled; nothing was fetched.
    SkippedDisabled,
    /// The provider had no measurements for the window. Not an error;
    /// gauges go silent routinely.
    NoData,
}

/// Collects water levels for one station over the given period.
pub fn collect_station_water_level<R, P, S>(
    cancel: &CancelToken,
    stations: &R,
    provider: &P,
    store: &mut S,
    station_id: &str,
    period: Period,
) -> Result<CollectOutcome, TaskError>
where
    R: StationRepository,
    P: StationProvider,
    S: MeasurementStore,
{
    logging::info(
        DataSource::Task,
        Some(station_id),
        &format!("Collecting water levels over {}", period),
    );

    let station = stations
        .get_by_id(station_id)?
        .ok_or_else(|| TaskError::StationNotFound(station_id.to_string()))?;

    if station.is_disabled {
        logging::info(
            DataSource::Task,
            Some(station_id),
            "Station is disabled, skipping collection",
        );
        return Ok(CollectOutcome::SkippedDisabled);
    }

    let pegelonline_id = station
        .pegelonline_id()
        .ok_or_else(|| TaskError::MissingExternalId(station_id.to_string()))?;

    let collection =
        match provider.station_water_level(pegelonline_id, Some(&period.to_string())) {
            Ok(collection) => collection,
            Err(err) => {
                logging::log_provider_failure(station_id, "water level fetch", &err);
                if matches!(err, crate::model::ProviderError::NoContent(_)) {
                    return Ok(CollectOutcome::NoData);
                }
                return Err(err.into());
            }
        };

    if collection.is_empty() {
        logging::warn(
            DataSource::Task,
            Some(station_id),
            "No water levels found for station",
        );
        return Ok(CollectOutcome::NoData);
    }

    let series_name = measurement_name(&["waterlevel", station_id]);
    let timeseries = build_timeseries(&collection, &series_name, period)?;
    let sample_count = timeseries.samples.len();

    store.add_timeseries(cancel, &timeseries)?;

    logging::info(
        DataSource::Task,
        Some(station_id),
        &format!("Stored {} samples as {}", sample_count, series_name),
    );
    Ok(CollectOutcome::Stored {
        samples: sample_count,
    })
}

/// Collects water levels for every station in the repository, logging
/// a summary. Per-station failures do not abort the run; cancellation
/// does.
pub fn collect_all<R, P, S>(
    cancel: &CancelToken,
    stations: &R,
    provider: &P,
    store: &mut S,
    period: Period,
) -> Result<(), TaskError>
where
    R: StationRepository,
    P: StationProvider,
    S: MeasurementStore,
{
    let all = stations.list()?;
    let total = all.len();
    let mut successful = 0;
    let mut failed = 0;

    for station in &all {
        if cancel.is_cancelled() {
            return Err(TaskError::Store(crate::store::StoreError::Cancelled));
        }

        match collect_station_water_level(cancel, stations, provider, store, &station.id, period) {
            Ok(_) => successful += 1,
            Err(TaskError::Store(crate::store::StoreError::Cancelled)) => {
                return Err(TaskError::Store(crate::store::StoreError::Cancelled));
            }
            Err(err) => {
                failed += 1;
                logging::error(DataSource::Task, Some(&station.id), &err.to_string());
            }
        }
    }

    logging::log_collection_summary(DataSource::Task, total, successful, failed);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProviderError, WaterLevelCollection, WaterLevelReading};
    use crate::stations::{seed_stations, MemoryStationRepository, Station};
    use crate::store::MemoryStore;

    /// Provider double that replays a fixed set of readings.
    struct StaticProvider {
        readings: Vec<WaterLevelReading>,
    }

    impl StationProvider for StaticProvider {
        fn stations(&self) -> Result<Vec<Station>, ProviderError> {
            Ok(Vec::new())
        }

        fn station(&self, _external_id: &str) -> Result<Station, ProviderError> {
            Err(ProviderError::NotFound("static".to_string()))
        }

        fn station_water_level(
            &self,
            external_id: &str,
            period: Option<&str>,
        ) -> Result<WaterLevelCollection, ProviderError> {
            if self.readings.is_empty() {
                return Err(ProviderError::NoContent(external_id.to_string()));
            }
            Ok(WaterLevelCollection::new(
                external_id,
                period.unwrap_or("P10D"),
                self.readings.clone(),
            ))
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    fn repo_with_seed() -> (MemoryStationRepository, String) {
        let repo = MemoryStationRepository::seeded();
        let id = seed_stations().remove(0).id;
        (repo, id)
    }

    #[test]
    fn test_collect_stores_samples_under_series_name() {
        let (repo, station_id) = repo_with_seed();
        let provider = StaticProvider {
            readings: vec![
                WaterLevelReading::new("2023-10-01T00:00:00Z", 100.0, ""),
                WaterLevelReading::new("2023-10-01T00:15:00Z", 101.0, ""),
            ],
        };
        let mut store = MemoryStore::new();
        let cancel = CancelToken::new();

        let outcome = collect_station_water_level(
            &cancel,
            &repo,
            &provider,
            &mut store,
            &station_id,
            Period::new(0, 2_000_000_000),
        )
        .unwrap();

        assert_eq!(outcome, CollectOutcome::Stored { samples: 2 });
        let series = format!("waterlevel-{}", station_id);
        assert_eq!(store.sample_count(&series), 2);
    }

    #[test]
    fn test_collect_twice_does_not_duplicate() {
        let (repo, station_id) = repo_with_seed();
        let provider = StaticProvider {
            readings: vec![WaterLevelReading::new("2023-10-01T00:00:00Z", 100.0, "")],
        };
        let mut store = MemoryStore::new();
        let cancel = CancelToken::new();
        let period = Period::new(0, 2_000_000_000);

        for _ in 0..2 {
            collect_station_water_level(
                &cancel,
                &repo,
                &provider,
                &mut store,
                &station_id,
                period,
            )
            .unwrap();
        }

        let series = format!("waterlevel-{}", station_id);
        assert_eq!(store.sample_count(&series), 1);
    }

    #[test]
    fn test_unknown_station_is_an_error() {
        let repo = MemoryStationRepository::new();
        let provider = StaticProvider { readings: vec![] };
        let mut store = MemoryStore::new();

        let result = collect_station_water_level(
            &CancelToken::new(),
            &repo,
            &provider,
            &mut store,
            "no-such-station",
            Period::new(0, 1),
        );
        assert!(matches!(result, Err(TaskError::StationNotFound(_))));
    }

    #[test]
    fn test_disabled_station_is_skipped() {
        let mut repo = MemoryStationRepository::new();
        let mut station = seed_stations().remove(0);
        station.is_disabled = true;
        repo.put(&station).unwrap();

        let provider = StaticProvider {
            readings: vec![WaterLevelReading::new("2023-10-01T00:00:00Z", 100.0, "")],
        };
        let mut store = MemoryStore::new();

        let outcome = collect_station_water_level(
            &CancelToken::new(),
            &repo,
            &provider,
            &mut store,
            &station.id,
            Period::new(0, 1),
        )
        .unwrap();
        assert_eq!(outcome, CollectOutcome::SkippedDisabled);
    }

    #[test]
    fn test_empty_provider_payload_is_no_data() {
        let (repo, station_id) = repo_with_seed();
        let provider = StaticProvider { readings: vec![] };
        let mut store = MemoryStore::new();

        let outcome = collect_station_water_level(
            &CancelToken::new(),
            &repo,
            &provider,
            &mut store,
            &station_id,
            Period::new(0, 1),
        )
        .unwrap();
        assert_eq!(outcome, CollectOutcome::NoData);
        assert_eq!(store.sample_count(&format!("waterlevel-{}", station_id)), 0);
    }

    #[test]
    fn test_station_without_external_id_is_an_error() {
        let mut repo = MemoryStationRepository::new();
        let mut station = seed_stations().remove(0);
        station.external_ids.clear();
        repo.put(&station).unwrap();

        let provider = StaticProvider { readings: vec![] };
        let mut store = MemoryStore::new();

        let result = collect_station_water_level(
            &CancelToken::new(),
            &repo,
            &provider,
            &mut store,
            &station.id,
            Period::new(0, 1),
        );
        assert!(matches!(result, Err(TaskError::MissingExternalId(_))));
    }
}
