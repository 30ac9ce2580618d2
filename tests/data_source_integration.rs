/// Integration tests for data source availability and database population
///
/// These tests verify:
/// 1. The PegelOnline API returns the seeded stations
/// 2. The PegelOnline API returns water levels for a seeded gauge
/// 3. PostgreSQL accepts a collected time series and returns it intact
/// 4. Full pipeline: API -> parse -> merge -> insert -> query
///
/// Prerequisites:
/// - PostgreSQL running with sql/001_base_schema.sql applied
/// - DATABASE_URL set in .env
/// - Internet connectivity to pegelonline.wsv.de
///
/// Run with: cargo test --test data_source_integration -- --ignored --test-threads=1
///
/// Note: These tests make real API calls and may be slow or fail if
/// the API is down, rate-limiting, or a gauge has gone silent.

use std::time::Duration;

use pegelmon_service::cancel::CancelToken;
use pegelmon_service::db::PgStore;
use pegelmon_service::ingest::pegelonline::{PegelOnlineProvider, PEGELONLINE_BASE_URL};
use pegelmon_service::ingest::StationProvider;
use pegelmon_service::measurement::measurement_name;
use pegelmon_service::period::Period;
use pegelmon_service::stations::MemoryStationRepository;
use pegelmon_service::store::MeasurementStore;
use pegelmon_service::task::collector;

const MANNHEIM: &str = "rhein-mannheim";
const MANNHEIM_UUID: &str = "59d9e75d-0099-4f37-a3b7-dcbd548aa97a";

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn live_provider() -> PegelOnlineProvider {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client");
    PegelOnlineProvider::new(client, PEGELONLINE_BASE_URL)
}

fn open_store() -> PgStore {
    dotenv::dotenv().ok();
    PgStore::open().expect("Failed to open test database; is DATABASE_URL set?")
}

// ---------------------------------------------------------------------------
// Provider availability
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_pegelonline_lists_stations() {
    let provider = live_provider();
    let stations = provider.stations().expect("PegelOnline station list failed");

    assert!(
        stations.len() > 100,
        "PegelOnline reports far fewer stations than expected: {}",
        stations.len()
    );
    assert!(stations.iter().all(|s| !s.id.is_empty()));
}

#[test]
#[ignore]
fn test_pegelonline_returns_water_levels_for_mannheim() {
    let provider = live_provider();
    let collection = provider
        .station_water_level(MANNHEIM_UUID, Some("P3D"))
        .expect("PegelOnline water level query failed");

    assert!(!collection.measurements.is_empty());
    for reading in &collection.measurements {
        assert!(reading.value.is_finite());
        assert!(!reading.timestamp.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Full pipeline against PostgreSQL
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_collect_and_query_round_trip() {
    let cancel = CancelToken::new();
    let stations = MemoryStationRepository::seeded();
    let provider = live_provider();
    let mut store = open_store();
    let period = Period::from_iso8601_duration("P3D").expect("valid period");

    collector::collect_station_water_level(
        &cancel, &stations, &provider, &mut store, MANNHEIM, period,
    )
    .expect("collection failed");

    let series_name = measurement_name(&["waterlevel", MANNHEIM]);
    let timeseries = store
        .get_timeseries(&series_name, period)
        .expect("query failed")
        .expect("series missing after collection");

    assert!(!timeseries.samples.is_empty());
    assert!(
        timeseries
            .samples
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp),
        "samples must come back in ascending timestamp order"
    );

    // A second run over the same window must not grow the series.
    let before = timeseries.samples.len();
    collector::collect_station_water_level(
        &cancel, &stations, &provider, &mut store, MANNHEIM, period,
    )
    .expect("re-collection failed");

    let after = store
        .get_timeseries(&series_name, period)
        .expect("query failed")
        .expect("series missing after re-collection")
        .samples
        .len();

    assert!(
        after >= before && after <= before + 50,
        "re-collection should only add genuinely new samples: {} -> {}",
        before,
        after
    );
}
