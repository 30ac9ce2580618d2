/// Dashboard build task.
///
/// Rebuilds the cached dashboard for one station: find the stored
/// dashboard by its deterministic ID and merge it, or populate a new
/// one from the station repository; then refresh the water-level
/// timeseries (and its trend) from the sample store and persist via
/// add-or-update.

use crate::analysis::trend::{calculate_trends, readings_from_timeseries};
use crate::cancel::CancelToken;
use crate::dashboard::{dashboard_id, Dashboard, DashboardRepository};
use crate::logging::{self, DataSource};
use crate::measurement::measurement_name;
use crate::model::TrendError;
use crate::period::{current_epoch, Period};
use crate::stations::StationRepository;
use crate::store::{MeasurementStore, StoreError};

use super::TaskError;

pub const DEFAULT_BUILD_PERIOD: &str = "P15D";
pub const DEFAULT_LANGUAGE_CODE: &str = "en";
pub const DEFAULT_TIMEZONE: &str = "utc";

#[derive(Debug, Clone)]
pub struct DashboardBuildOptions {
    pub station_id: String,
    /// ISO 8601 duration of the water-level window.
    pub period: String,
    pub language_code: String,
    pub timezone: String,
}

impl DashboardBuildOptions {
    pub fn new(station_id: &str) -> Self {
        DashboardBuildOptions {
            station_id: station_id.to_string(),
            period: DEFAULT_BUILD_PERIOD.to_string(),
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Builds (or refreshes) one dashboard and persists it. Returns the
/// persisted dashboard.
pub fn build_dashboard<R, D, S>(
    cancel: &CancelToken,
    stations: &R,
    dashboards: &mut D,
    store: &mut S,
    opts: &DashboardBuildOptions,
) -> Result<Dashboard, TaskError>
where
    R: StationRepository,
    D: DashboardRepository,
    S: MeasurementStore,
{
    if cancel.is_cancelled() {
        return Err(TaskError::Store(StoreError::Cancelled));
    }

    let id = dashboard_id(&opts.station_id, &opts.language_code, &opts.timezone)?;
    let mut dashboard = Dashboard::empty(&opts.station_id, &opts.language_code, &opts.timezone);

    match dashboards.get_by_id(&id)? {
        Some(existing) => {
            logging::info(
                DataSource::Task,
                Some(&opts.station_id),
                "Existing dashboard found, merging data",
            );
            dashboard.merge(&existing);
        }
        None => {
            logging::info(
                DataSource::Task,
                Some(&opts.station_id),
                "No existing dashboard found, creating a new one",
            );
            let station = stations
                .get_by_id(&opts.station_id)?
                .ok_or_else(|| TaskError::StationNotFound(opts.station_id.clone()))?;

            dashboard.name = format!("Dashboard for {}", station.name);
            dashboard.description = format!("Auto-generated dashboard for station {}", station.name);
            dashboard.station = station;
        }
    }

    // Refresh the water level from the sample store.
    let period = Period::from_iso8601_duration(&opts.period)?;
    let series_name = measurement_name(&["waterlevel", &opts.station_id]);

    if let Some(timeseries) = store.get_timeseries(&series_name, period)? {
        let readings = readings_from_timeseries(&timeseries);
        dashboard.water_level_trend = match calculate_trends(&readings) {
            Ok(trend) => Some(trend),
            Err(TrendError::EmptyCollection) => None,
            Err(err) => {
                logging::warn(
                    DataSource::Task,
                    Some(&opts.station_id),
                    &format!("Trend computation failed: {}", err),
                );
                None
            }
        };
        dashboard.water_level = Some(timeseries);
    } else {
        logging::warn(
            DataSource::Task,
            Some(&opts.station_id),
            &format!("No timeseries {} in the sample store yet", series_name),
        );
    }

    // Persist: add when new, update when the merge found a stored one.
    let now = current_epoch();
    dashboard.updated_at = now;
    if dashboard.created_at == 0 {
        dashboard.created_at = now;
    }

    if dashboard.is_saved() {
        dashboards.update(&dashboard)?;
        logging::info(DataSource::Task, Some(&opts.station_id), "Updated dashboard");
    } else {
        dashboard.id = id;
        dashboards.add(&dashboard)?;
        logging::info(DataSource::Task, Some(&opts.station_id), "Added new dashboard");
    }

    Ok(dashboard)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::MemoryDashboardRepository;
    use crate::measurement::{Measurement, Sample, Timeseries};
    use crate::stations::{seed_stations, MemoryStationRepository};
    use crate::store::MemoryStore;

    fn store_with_samples(station_id: &str, samples: Vec<(i64, f64)>) -> MemoryStore {
        let mut store = MemoryStore::new();
        let name = measurement_name(&["waterlevel", station_id]);
        let ts = Timeseries {
            name: name.clone(),
            samples: samples
                .into_iter()
                .map(|(timestamp, value)| Sample {
                    id: 0,
                    measurement_id: 0,
                    value,
                    timestamp,
                })
                .collect(),
            start: 0,
            end: i64::MAX,
            measurement: Some(Measurement {
                id: 0,
                name,
                description: String::new(),
                unit: "cm".to_string(),
            }),
        };
        store
            .add_timeseries(&CancelToken::new(), &ts)
            .expect("memory store accepts samples");
        store
    }

    #[test]
    fn test_new_dashboard_is_populated_from_station_repo() {
        let stations = MemoryStationRepository::seeded();
        let station_id = seed_stations().remove(0).id;
        let mut dashboards = MemoryDashboardRepository::new();
        // recent samples so the period window covers them
        let now = current_epoch();
        let mut store = store_with_samples(&station_id, vec![(now - 120, 100.0), (now - 60, 105.0)]);

        let opts = DashboardBuildOptions::new(&station_id);
        let built = build_dashboard(
            &CancelToken::new(),
            &stations,
            &mut dashboards,
            &mut store,
            &opts,
        )
        .unwrap();

        assert!(built.is_saved());
        assert_eq!(built.station.id, station_id);
        assert!(built.name.contains("Mannheim"));
        assert_eq!(built.water_level.as_ref().unwrap().samples.len(), 2);
        assert!(built.created_at > 0);

        let stored = dashboards.get_by_id(&built.id).unwrap();
        assert!(stored.is_some());
    }

    #[test]
    fn test_rebuild_merges_with_stored_dashboard() {
        let stations = MemoryStationRepository::seeded();
        let station_id = seed_stations().remove(0).id;
        let mut dashboards = MemoryDashboardRepository::new();
        let now = current_epoch();
        let mut store = store_with_samples(&station_id, vec![(now - 60, 100.0)]);

        let opts = DashboardBuildOptions::new(&station_id);
        let first = build_dashboard(
            &CancelToken::new(),
            &stations,
            &mut dashboards,
            &mut store,
            &opts,
        )
        .unwrap();

        let second = build_dashboard(
            &CancelToken::new(),
            &stations,
            &mut dashboards,
            &mut store,
            &opts,
        )
        .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.name, first.name);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(dashboards.list().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_station_fails_the_build() {
        let stations = MemoryStationRepository::new();
        let mut dashboards = MemoryDashboardRepository::new();
        let mut store = MemoryStore::new();

        let opts = DashboardBuildOptions::new("no-such-station");
        let result = build_dashboard(
            &CancelToken::new(),
            &stations,
            &mut dashboards,
            &mut store,
            &opts,
        );
        assert!(matches!(result, Err(TaskError::StationNotFound(_))));
    }

    #[test]
    fn test_missing_timeseries_still_persists_dashboard() {
        let stations = MemoryStationRepository::seeded();
        let station_id = seed_stations().remove(0).id;
        let mut dashboards = MemoryDashboardRepository::new();
        let mut store = MemoryStore::new();

        let opts = DashboardBuildOptions::new(&station_id);
        let built = build_dashboard(
            &CancelToken::new(),
            &stations,
            &mut dashboards,
            &mut store,
            &opts,
        )
        .unwrap();

        assert!(built.water_level.is_none());
        assert!(built.water_level_trend.is_none());
        assert!(built.is_saved());
    }

    #[test]
    fn test_cancelled_build_does_nothing() {
        let stations = MemoryStationRepository::seeded();
        let station_id = seed_stations().remove(0).id;
        let mut dashboards = MemoryDashboardRepository::new();
        let mut store = MemoryStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let opts = DashboardBuildOptions::new(&station_id);
        let result = build_dashboard(&cancel, &stations, &mut dashboards, &mut store, &opts);
        assert!(matches!(
            result,
            Err(TaskError::Store(StoreError::Cancelled))
        ));
        assert!(dashboards.list().unwrap().is_empty());
    }
}
