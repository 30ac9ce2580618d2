//! PegelMon - river water level monitoring service
//!
//! Collects water level measurements for German river gauges from the
//! PegelOnline API, stores them as idempotent time series in PostgreSQL,
//! and assembles per-station dashboards with day-aligned trend deltas
//! (1, 3 and 7 days).

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod measurement;
pub mod model;
pub mod period;
pub mod stations;
pub mod store;
pub mod task;
