/// Derived station dashboards.
///
/// A dashboard is a cached aggregate of station metadata plus its
/// latest water-level timeseries, rebuilt periodically by the
/// dashboard builder task. A freshly built dashboard is field-wise
/// merged with its stored counterpart (if any) before being persisted
/// via add-or-update, so rebuilds keep the stored identity.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::measurement::{slugify, Timeseries};
use crate::model::Trend;
use crate::stations::Station;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Empty until the dashboard has been persisted once.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub station: Station,
    pub water_level: Option<Timeseries>,
    /// Day-aligned deltas computed from `water_level` at build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level_trend: Option<Trend>,
    pub language_code: String,
    pub timezone: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Dashboard {
    /// An unsaved dashboard shell for the given station and locale.
    pub fn empty(station_id: &str, language_code: &str, timezone: &str) -> Self {
        Dashboard {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            station: placeholder_station(station_id),
            water_level: None,
            water_level_trend: None,
            language_code: language_code.to_string(),
            timezone: timezone.to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Field-wise merge with the stored dashboard: non-empty/non-zero
    /// fields on `self` (the freshly built side) win; empty or zero on
    /// the new side keeps the stored value.
    pub fn merge(&mut self, existing: &Dashboard) {
        if self.id.is_empty() {
            self.id = existing.id.clone();
        }
        if self.name.is_empty() {
            self.name = existing.name.clone();
        }
        if self.description.is_empty() {
            self.description = existing.description.clone();
        }
        if self.station.name.is_empty() && !existing.station.name.is_empty() {
            self.station = existing.station.clone();
        }
        if self.water_level.is_none() {
            self.water_level = existing.water_level.clone();
        }
        if self.water_level_trend.is_none() {
            self.water_level_trend = existing.water_level_trend.clone();
        }
        if self.language_code.is_empty() {
            self.language_code = existing.language_code.clone();
        }
        if self.timezone.is_empty() {
            self.timezone = existing.timezone.clone();
        }
        if self.created_at == 0 {
            self.created_at = existing.created_at;
        }
        if self.updated_at == 0 {
            self.updated_at = existing.updated_at;
        }
    }

    pub fn is_saved(&self) -> bool {
        !self.id.is_empty()
    }
}

fn placeholder_station(station_id: &str) -> Station {
    Station {
        id: station_id.to_string(),
        name: String::new(),
        water: String::new(),
        location: Default::default(),
        external_ids: Vec::new(),
        is_disabled: false,
    }
}

/// Deterministic dashboard ID from station, language and timezone, so
/// repeated builds find their stored counterpart.
pub fn dashboard_id(
    station_id: &str,
    language_code: &str,
    timezone: &str,
) -> Result<String, DashboardError> {
    if station_id.is_empty() {
        return Err(DashboardError::MissingStationId);
    }
    Ok(slugify(&format!(
        "{}-{}-{}",
        station_id, language_code, timezone
    )))
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum DashboardError {
    MissingStationId,
    NotReady,
    Storage(String),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::MissingStationId => {
                write!(f, "dashboard station ID cannot be empty")
            }
            DashboardError::NotReady => write!(f, "dashboard repository is not available"),
            DashboardError::Storage(msg) => write!(f, "dashboard repository error: {}", msg),
        }
    }
}

impl std::error::Error for DashboardError {}

pub trait DashboardRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Dashboard>, DashboardError>;
    fn add(&mut self, dashboard: &Dashboard) -> Result<(), DashboardError>;
    fn update(&mut self, dashboard: &Dashboard) -> Result<(), DashboardError>;
    fn list(&self) -> Result<Vec<Dashboard>, DashboardError>;
    fn is_ready(&self) -> bool;
}

#[derive(Default)]
pub struct MemoryDashboardRepository {
    dashboards: HashMap<String, Dashboard>,
}

impl MemoryDashboardRepository {
    pub fn new() -> Self {
        MemoryDashboardRepository::default()
    }
}

impl DashboardRepository for MemoryDashboardRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Dashboard>, DashboardError> {
        Ok(self.dashboards.get(id).cloned())
    }

    fn add(&mut self, dashboard: &Dashboard) -> Result<(), DashboardError> {
        self.dashboards
            .insert(dashboard.id.clone(), dashboard.clone());
        Ok(())
    }

    fn update(&mut self, dashboard: &Dashboard) -> Result<(), DashboardError> {
        if !self.dashboards.contains_key(&dashboard.id) {
            return Err(DashboardError::Storage(format!(
                "dashboard {} does not exist",
                dashboard.id
            )));
        }
        self.dashboards
            .insert(dashboard.id.clone(), dashboard.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Dashboard>, DashboardError> {
        let mut dashboards: Vec<Dashboard> = self.dashboards.values().cloned().collect();
        dashboards.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(dashboards)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
