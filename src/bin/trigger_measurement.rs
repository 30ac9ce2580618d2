/// Measurement collection trigger.
///
/// Fetches water levels from PegelOnline for one station (first
/// argument) or for every registered station (no arguments), and
/// stores them in PostgreSQL. Intended to run from cron or a systemd
/// timer.
///
/// Usage:
///   trigger-measurement [station-id] [period]
///
/// Environment:
///   DATABASE_URL          PostgreSQL connection string (required)
///   PEGELONLINE_API       Provider endpoint override
///   PEGELMON_PERIOD       Default collection period (ISO 8601 duration)
///   PEGELMON_LOG_LEVEL    debug | info | warning | error

use std::process::ExitCode;
use std::time::Duration;

use pegelmon_service::cancel::CancelToken;
use pegelmon_service::config::ServiceConfig;
use pegelmon_service::db::PgStore;
use pegelmon_service::ingest::pegelonline::PegelOnlineProvider;
use pegelmon_service::logging::{self, DataSource, LogLevel};
use pegelmon_service::period::Period;
use pegelmon_service::stations::MemoryStationRepository;
use pegelmon_service::task::collector;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            // logger may not be initialized yet when config loading fails
            eprintln!("trigger-measurement: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = ServiceConfig::load(None).map_err(|e| e.to_string())?;

    logging::init_logger(
        LogLevel::from_name(&config.log_level),
        config.log_file.as_deref(),
        true,
    );

    config.validate_for_triggers().map_err(|e| e.to_string())?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let station_id = args.first().map(|s| s.as_str());
    let period_str = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or(&config.default_period);

    let period = Period::from_iso8601_duration(period_str)
        .map_err(|e| format!("invalid period '{}': {}", period_str, e))?;

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| format!("failed to build HTTP client: {}", e))?;
    let provider = PegelOnlineProvider::new(client, &config.api_endpoint);

    let stations = MemoryStationRepository::seeded();
    let mut store =
        PgStore::open_url(&config.database_url).map_err(|e| format!("store unavailable: {}", e))?;

    let cancel = CancelToken::new();

    match station_id {
        Some(id) => {
            let outcome = collector::collect_station_water_level(
                &cancel, &stations, &provider, &mut store, id, period,
            )
            .map_err(|e| format!("collection for '{}' failed: {}", id, e))?;
            logging::info(
                DataSource::Task,
                Some(id),
                &format!("Collection finished: {:?}", outcome),
            );
        }
        None => {
            collector::collect_all(&cancel, &stations, &provider, &mut store, period)
                .map_err(|e| format!("collection run failed: {}", e))?;
        }
    }

    Ok(())
}
