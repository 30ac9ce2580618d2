/// PegelOnline REST API client.
///
/// Retrieves gauge stations and water-level measurements from the
/// German Federal Waterways and Shipping Administration (WSV)
/// PegelOnline service.
///
/// API documentation: https://www.pegelonline.wsv.de/webservice/dokuRestapi
///
/// The provider is untrusted: payloads may be empty, stations may lack
/// names, and measurement timestamps are validated again during merge.

use serde::Deserialize;

use crate::analysis::trend::augment_collection;
use crate::logging::{self, DataSource};
use crate::model::{ProviderError, WaterLevelCollection, WaterLevelReading, DEFAULT_TIME_PERIOD};
use crate::stations::{new_station_id, ExternalId, Location, Station, PEGELONLINE_PROVIDER_NAME};

pub const PEGELONLINE_BASE_URL: &str = "https://www.pegelonline.wsv.de/webservices/rest-api/v2";

/// PegelOnline timeseries shortname for water level ("Wasserstand").
const WATER_LEVEL_TIMESERIES: &str = "W";

// ============================================================================
// PegelOnline API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PegelOnlineStation {
    pub uuid: String,
    #[serde(rename = "longname")]
    pub long_name: String,
    #[serde(rename = "shortname")]
    pub short_name: String,
    #[serde(default)]
    pub km: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub water: PegelOnlineWater,
}

#[derive(Debug, Deserialize)]
pub struct PegelOnlineWater {
    #[serde(rename = "longname")]
    pub long_name: String,
    #[serde(rename = "shortname", default)]
    pub short_name: String,
}

/// One entry of `stations/{uuid}/W/measurements.json`. The payload
/// carries no unit; water levels are centimeters by convention.
#[derive(Debug, Deserialize)]
pub struct PegelOnlineMeasurement {
    pub timestamp: String,
    pub value: f64,
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Fetch the full station catalog.
pub fn fetch_stations(
    client: &reqwest::blocking::Client,
    api_endpoint: &str,
) -> Result<Vec<Station>, ProviderError> {
    let url = format!("{}/stations.json", api_endpoint);
    let raw: Vec<PegelOnlineStation> = get_json(client, &url)?;

    if raw.is_empty() {
        return Err(ProviderError::NoContent(
            "station catalog is empty, check if the data schema changed".to_string(),
        ));
    }

    raw.iter().map(map_station).collect()
}

/// Fetch a single station by its PegelOnline UUID.
pub fn fetch_station(
    client: &reqwest::blocking::Client,
    api_endpoint: &str,
    uuid: &str,
) -> Result<Station, ProviderError> {
    if uuid.is_empty() {
        return Err(ProviderError::InvalidStationId);
    }

    let url = format!("{}/stations/{}.json", api_endpoint, uuid);
    let raw: PegelOnlineStation = get_json(client, &url)?;
    map_station(&raw)
}

/// Fetch water-level measurements for a station over an ISO 8601
/// period counted back from now (e.g. "P10D"). The provider returns
/// readings in ascending timestamp order; downstream trend logic
/// relies on that ordering.
pub fn fetch_water_levels(
    client: &reqwest::blocking::Client,
    api_endpoint: &str,
    uuid: &str,
    period: Option<&str>,
) -> Result<WaterLevelCollection, ProviderError> {
    if uuid.is_empty() {
        return Err(ProviderError::InvalidStationId);
    }

    let period = period.unwrap_or(DEFAULT_TIME_PERIOD);
    let url = format!(
        "{}/stations/{}/{}/measurements.json?start={}",
        api_endpoint, uuid, WATER_LEVEL_TIMESERIES, period
    );

    let raw: Vec<PegelOnlineMeasurement> = get_json(client, &url)?;
    if raw.is_empty() {
        return Err(ProviderError::NoContent(format!(
            "no measurements for station {}",
            uuid
        )));
    }

    let measurements = raw
        .into_iter()
        .map(|m| WaterLevelReading {
            timestamp: m.timestamp,
            value: m.value,
            unit: String::new(), // stamped from the collection unit on augment
        })
        .collect();

    Ok(WaterLevelCollection::new(uuid, period, measurements))
}

fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::blocking::Client,
    url: &str,
) -> Result<T, ProviderError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::HttpError(status.as_u16()));
    }

    response
        .json()
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

// ============================================================================
// Provider implementation
// ============================================================================

/// `StationProvider` backed by the live PegelOnline REST API.
pub struct PegelOnlineProvider {
    client: reqwest::blocking::Client,
    api_endpoint: String,
}

impl PegelOnlineProvider {
    pub fn new(client: reqwest::blocking::Client, api_endpoint: &str) -> Self {
        PegelOnlineProvider {
            client,
            api_endpoint: api_endpoint.to_string(),
        }
    }
}

impl crate::ingest::StationProvider for PegelOnlineProvider {
    fn stations(&self) -> Result<Vec<Station>, ProviderError> {
        fetch_stations(&self.client, &self.api_endpoint)
    }

    fn station(&self, external_id: &str) -> Result<Station, ProviderError> {
        fetch_station(&self.client, &self.api_endpoint, external_id)
    }

    fn station_water_level(
        &self,
        external_id: &str,
        period: Option<&str>,
    ) -> Result<WaterLevelCollection, ProviderError> {
        let mut collection =
            fetch_water_levels(&self.client, &self.api_endpoint, external_id, period)?;
        // unit, latest and trend are decoration; a trend failure leaves
        // the field absent instead of failing the fetch
        if let Err(err) = augment_collection(&mut collection) {
            logging::warn(
                DataSource::PegelOnline,
                Some(external_id),
                &format!("Trend computation failed: {}", err),
            );
        }
        Ok(collection)
    }

    fn is_ready(&self) -> bool {
        !self.api_endpoint.is_empty()
    }
}

// ============================================================================
// Mapping to the internal model
// ============================================================================

pub fn map_station(raw: &PegelOnlineStation) -> Result<Station, ProviderError> {
    if raw.uuid.is_empty() {
        return Err(ProviderError::InvalidStationId);
    }
    if raw.long_name.is_empty() || raw.water.long_name.is_empty() {
        return Err(ProviderError::ParseError(format!(
            "station or water name is empty for UUID {}",
            raw.uuid
        )));
    }

    Ok(Station {
        id: new_station_id(&raw.water.long_name, &raw.long_name),
        name: capitalize(&raw.long_name),
        water: capitalize(&raw.water.long_name),
        location: Location {
            km: raw.km,
            latitude: raw.latitude,
            longitude: raw.longitude,
        },
        external_ids: vec![ExternalId {
            name: PEGELONLINE_PROVIDER_NAME.to_string(),
            id: raw.uuid.clone(),
        }],
        is_disabled: false,
    })
}

/// PegelOnline delivers names in upper case ("MANNHEIM"); present them
/// with a leading capital only.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
        }
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_station(uuid: &str, name: &str, water: &str) -> PegelOnlineStation {
        PegelOnlineStation {
            uuid: uuid.to_string(),
            long_name: name.to_string(),
            short_name: name.to_string(),
            km: 424.7,
            latitude: 49.48,
            longitude: 8.46,
            water: PegelOnlineWater {
                long_name: water.to_string(),
                short_name: water.to_string(),
            },
        }
    }

    #[test]
    fn test_map_station_builds_internal_model() {
        let raw = raw_station("59d9e75d", "MANNHEIM", "RHEIN");
        let station = map_station(&raw).unwrap();

        assert_eq!(station.id, "rhein-mannheim");
        assert_eq!(station.name, "Mannheim");
        assert_eq!(station.water, "Rhein");
        assert_eq!(station.pegelonline_id(), Some("59d9e75d"));
        assert_eq!(station.location.km, 424.7);
    }

    #[test]
    fn test_map_station_rejects_missing_identifiers() {
        assert!(matches!(
            map_station(&raw_station("", "MANNHEIM", "RHEIN")),
            Err(ProviderError::InvalidStationId)
        ));
        assert!(matches!(
            map_station(&raw_station("59d9e75d", "", "RHEIN")),
            Err(ProviderError::ParseError(_))
        ));
        assert!(matches!(
            map_station(&raw_station("59d9e75d", "MANNHEIM", "")),
            Err(ProviderError::ParseError(_))
        ));
    }

    #[test]
    fn test_measurement_payload_deserializes() {
        let json = r#"[
            {"timestamp": "2023-10-01T00:00:00+02:00", "value": 320.0},
            {"timestamp": "2023-10-01T00:15:00+02:00", "value": 321.0}
        ]"#;

        let parsed: Vec<PegelOnlineMeasurement> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].value, 321.0);
    }

    #[test]
    fn test_station_payload_deserializes() {
        let json = r#"{
            "uuid": "59d9e75d-0099-4f37-a3b7-dcbd548aa97a",
            "number": "23700600",
            "shortname": "MANNHEIM",
            "longname": "MANNHEIM",
            "km": 424.7,
            "agency": "AMT NECKAR",
            "longitude": 8.46,
            "latitude": 49.48,
            "water": {"shortname": "RHEIN", "longname": "RHEIN"}
        }"#;

        let parsed: PegelOnlineStation = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.uuid, "59d9e75d-0099-4f37-a3b7-dcbd548aa97a");
        assert_eq!(parsed.water.long_name, "RHEIN");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("MANNHEIM"), "Mannheim");
        assert_eq!(capitalize("rhein"), "Rhein");
        assert_eq!(capitalize(""), "");
    }
}
