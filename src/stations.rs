/// Station registry for the water-level aggregation service.
///
/// A `Station` is the internal, provider-neutral description of a
/// gauge: a slug ID derived from water and station name, a location,
/// and the external IDs that map it back to its upstream providers.
/// The repository is the key-value cache collaborators read stations
/// from; absence is always `Ok(None)`, never a zeroed struct.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::measurement::slugify;

/// External-ID name under which PegelOnline UUIDs are stored.
pub const PEGELONLINE_PROVIDER_NAME: &str = "pegelonline";

// ---------------------------------------------------------------------------
// Station model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    /// Name of the river the gauge sits on.
    pub water: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_ids: Vec<ExternalId>,
    /// Disabled stations are skipped by the collector.
    #[serde(default)]
    pub is_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalId {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Distance from the river source, in kilometers.
    pub km: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    pub fn external_id(&self, provider: &str) -> Option<&str> {
        self.external_ids
            .iter()
            .find(|e| e.name == provider)
            .map(|e| e.id.as_str())
    }

    pub fn pegelonline_id(&self) -> Option<&str> {
        self.external_id(PEGELONLINE_PROVIDER_NAME)
    }
}

/// Canonical internal station ID: slug of "<water>-<name>".
pub fn new_station_id(water_name: &str, station_name: &str) -> String {
    slugify(&format!("{}-{}", water_name, station_name))
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RepositoryError {
    NotReady,
    Storage(String),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::NotReady => write!(f, "station repository is not available"),
            RepositoryError::Storage(msg) => write!(f, "station repository error: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

pub trait StationRepository {
    /// `Ok(None)` when the ID is unknown.
    fn get_by_id(&self, id: &str) -> Result<Option<Station>, RepositoryError>;
    fn put(&mut self, station: &Station) -> Result<(), RepositoryError>;
    fn put_all(&mut self, stations: &[Station]) -> Result<(), RepositoryError>;
    /// All stations, ordered by ID.
    fn list(&self) -> Result<Vec<Station>, RepositoryError>;
    fn is_ready(&self) -> bool;
}

/// HashMap-backed repository; the per-request cache of the deployed
/// service, and the test double everywhere else.
#[derive(Default)]
pub struct MemoryStationRepository {
    stations: HashMap<String, Station>,
}

impl MemoryStationRepository {
    pub fn new() -> Self {
        MemoryStationRepository::default()
    }

    /// Repository pre-populated with the seed registry.
    pub fn seeded() -> Self {
        let mut repo = MemoryStationRepository::new();
        for station in seed_stations() {
            repo.stations.insert(station.id.clone(), station);
        }
        repo
    }
}

impl StationRepository for MemoryStationRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Station>, RepositoryError> {
        Ok(self.stations.get(id).cloned())
    }

    fn put(&mut self, station: &Station) -> Result<(), RepositoryError> {
        self.stations.insert(station.id.clone(), station.clone());
        Ok(())
    }

    fn put_all(&mut self, stations: &[Station]) -> Result<(), RepositoryError> {
        for station in stations {
            self.put(station)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Station>, RepositoryError> {
        let mut stations: Vec<Station> = self.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stations)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Seed registry
// ---------------------------------------------------------------------------

/// Well-known Rhine gauges used to bootstrap an empty repository. The
/// full catalog comes from the provider's station listing; this subset
/// keeps the trigger binaries usable before the first full sync.
///
/// UUIDs are the stable PegelOnline station identifiers
/// (pegelonline.wsv.de).
pub fn seed_stations() -> Vec<Station> {
    vec![
        Station {
            id: new_station_id("Rhein", "Mannheim"),
            name: "Mannheim".to_string(),
            water: "Rhein".to_string(),
            location: Location {
                km: 424.7,
                latitude: 49.4894,
                longitude: 8.4600,
            },
            external_ids: vec![ExternalId {
                name: PEGELONLINE_PROVIDER_NAME.to_string(),
                id: "59d9e75d-0099-4f37-a3b7-dcbd548aa97a".to_string(),
            }],
            is_disabled: false,
        },
        Station {
            id: new_station_id("Rhein", "Kaub"),
            name: "Kaub".to_string(),
            water: "Rhein".to_string(),
            location: Location {
                km: 546.3,
                latitude: 50.0851,
                longitude: 7.7648,
            },
            external_ids: vec![ExternalId {
                name: PEGELONLINE_PROVIDER_NAME.to_string(),
                id: "1d26e504-7f9e-480a-b52c-5932be6549ab".to_string(),
            }],
            is_disabled: false,
        },
        Station {
            id: new_station_id("Rhein", "Koblenz"),
            name: "Koblenz".to_string(),
            water: "Rhein".to_string(),
            location: Location {
                km: 591.5,
                latitude: 50.3640,
                longitude: 7.6047,
            },
            external_ids: vec![ExternalId {
                name: PEGELONLINE_PROVIDER_NAME.to_string(),
                id: "4c7d796a-39f2-4f26-97a9-3aad01060962".to_string(),
            }],
            is_disabled: false,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_id_is_slug_of_water_and_name() {
        assert_eq!(new_station_id("Rhein", "Mannheim"), "rhein-mannheim");
        assert_eq!(new_station_id("Mosel", "Trier UP"), "mosel-trier-up");
    }

    #[test]
    fn test_external_id_lookup() {
        let station = seed_stations().remove(0);
        assert!(station.pegelonline_id().is_some());
        assert!(station.external_id("unknown-provider").is_none());
    }

    #[test]
    fn test_repository_absent_is_none_not_error() {
        let repo = MemoryStationRepository::new();
        assert!(repo.get_by_id("rhein-mannheim").unwrap().is_none());
    }

    #[test]
    fn test_seeded_repository_lists_in_id_order() {
        let repo = MemoryStationRepository::seeded();
        let ids: Vec<String> = repo.list().unwrap().into_iter().map(|s| s.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(ids.contains(&"rhein-mannheim".to_string()));
    }

    #[test]
    fn test_put_all_fills_an_empty_repository() {
        let mut repo = MemoryStationRepository::new();
        repo.put_all(&seed_stations()).unwrap();
        assert_eq!(repo.list().unwrap().len(), seed_stations().len());
    }

    #[test]
    fn test_put_overwrites_existing_station() {
        let mut repo = MemoryStationRepository::new();
        let mut station = seed_stations().remove(0);
        repo.put(&station).unwrap();

        station.is_disabled = true;
        repo.put(&station).unwrap();

        let fetched = repo.get_by_id(&station.id).unwrap().unwrap();
        assert!(fetched.is_disabled);
    }
}
