/// Analysis utilities for the water-level service.
///
/// The only analysis performed in-process is the day-aligned trend
/// computation; heavier statistics belong to downstream consumers of
/// the curated database.
///
/// Submodules:
/// - `trend`: calendar-day-aligned P1D/P3D/P7D delta computation.

pub mod trend;
