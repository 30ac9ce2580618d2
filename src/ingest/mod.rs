/// Ingest clients for external telemetry providers.
///
/// Submodules:
/// - `pegelonline`: WSV PegelOnline REST API (stations + water levels).

use crate::model::{ProviderError, WaterLevelCollection};
use crate::stations::Station;

pub mod pegelonline;

/// Capability of an upstream water-level provider. The production
/// implementation is `pegelonline::PegelOnlineProvider`; tasks and
/// tests depend only on this trait.
pub trait StationProvider {
    fn stations(&self) -> Result<Vec<Station>, ProviderError>;
    fn station(&self, external_id: &str) -> Result<Station, ProviderError>;
    /// Water levels over an ISO 8601 period counted back from now;
    /// `None` asks for the provider default window.
    fn station_water_level(
        &self,
        external_id: &str,
        period: Option<&str>,
    ) -> Result<WaterLevelCollection, ProviderError>;
    fn is_ready(&self) -> bool;
}
