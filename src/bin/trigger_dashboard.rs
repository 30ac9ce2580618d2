/// Dashboard build trigger.
///
/// Assembles a dashboard for one station from the stored water level
/// samples (time series window, latest reading, 1/3/7-day trends) and
/// prints it as JSON on stdout. Pair it with trigger-measurement in a
/// cron schedule and point a static frontend at the emitted files.
///
/// Usage:
///   trigger-dashboard <station-id> [period] [language] [timezone]
///
/// Environment:
///   DATABASE_URL          PostgreSQL connection string (required)
///   PEGELMON_LOG_LEVEL    debug | info | warning | error

use std::process::ExitCode;

use pegelmon_service::cancel::CancelToken;
use pegelmon_service::config::ServiceConfig;
use pegelmon_service::dashboard::MemoryDashboardRepository;
use pegelmon_service::db::PgStore;
use pegelmon_service::logging::{self, LogLevel};
use pegelmon_service::stations::MemoryStationRepository;
use pegelmon_service::task::dashboard_builder::{self, DashboardBuildOptions};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            // logger may not be initialized yet when config loading fails
            eprintln!("trigger-dashboard: {}", message);
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

    if config.database_url.is_empty() {
        return Err("DATABASE_URL is not set".to_string());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let station_id = args
        .first()
        .ok_or_else(|| "usage: trigger-dashboard <station-id> [period] [language] [timezone]".to_string())?;

    let mut opts = DashboardBuildOptions::new(station_id);
    if let Some(period) = args.get(1) {
        opts.period = period.clone();
    }
    if let Some(language) = args.get(2) {
        opts.language_code = language.clone();
    }
    if let Some(timezone) = args.get(3) {
        opts.timezone = timezone.clone();
    }

    let stations = MemoryStationRepository::seeded();
    let mut dashboards = MemoryDashboardRepository::new();
    let mut store =
        PgStore::open_url(&config.database_url).map_err(|e| format!("store unavailable: {}", e))?;

    let cancel = CancelToken::new();
    let dashboard =
        dashboard_builder::build_dashboard(&cancel, &stations, &mut dashboards, &mut store, &opts)
            .map_err(|e| format!("dashboard build for '{}' failed: {}", station_id, e))?;

    let rendered = serde_json::to_string_pretty(&dashboard)
        .map_err(|e| format!("failed to render dashboard: {}", e))?;
    println!("{}", rendered);

    Ok(())
}
