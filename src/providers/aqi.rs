//! AQI provider client and tolerant payload handling.
//!
//! Speaks a WAQI-style feed API: `GET {base}/feed/{city}/?token=…` or
//! `GET {base}/feed/geo:{lat};{lng}/?token=…`. The response carries a status
//! flag ("ok" is the only success value), a primary index, optional
//! per-pollutant sub-indicators, station metadata and an observation
//! timestamp.
//!
//! Two pure helpers live here alongside the client because they interpret
//! this provider's payload shape: [`derive_index`], the fallback search for a
//! usable index value, and [`parse_station_coords`], the tolerant station
//! coordinate parser. Neither ever fails; both yield `None` on anything they
//! cannot interpret.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::model::Coordinates;

/// Client for the AQI provider.
#[derive(Clone)]
pub struct AqiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AqiClient {
    /// Create a client against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: super::build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Fetch the feed for a named place.
    pub async fn fetch_city(&self, city: &str) -> Result<AqiResponse, reqwest::Error> {
        let url = format!(
            "{}/feed/{}/?token={}",
            self.base_url,
            urlencoding::encode(city.trim()),
            self.token
        );
        debug!(%city, "fetching AQI feed by city");
        self.client.get(&url).send().await?.json().await
    }

    /// Fetch the feed for the station nearest to the given coordinates.
    pub async fn fetch_geo(&self, coords: Coordinates) -> Result<AqiResponse, reqwest::Error> {
        let url = format!(
            "{}/feed/geo:{};{}/?token={}",
            self.base_url, coords.lat, coords.lng, self.token
        );
        debug!(lat = coords.lat, lng = coords.lng, "fetching AQI feed by coordinates");
        self.client.get(&url).send().await?.json().await
    }
}

/// Top-level provider response.
///
/// `data` is kept as raw JSON because the provider reuses the field for an
/// error message string when `status` is not "ok".
#[derive(Debug, Clone, Deserialize)]
pub struct AqiResponse {
    pub status: String,
    #[serde(default)]
    pub data: Value,
}

impl AqiResponse {
    /// A non-"ok" status is the sole provider-error signal.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// The error detail the provider put in `data`, when it is a string.
    pub fn error_detail(&self) -> Option<&str> {
        self.data.as_str()
    }

    /// The typed payload, when `data` actually carries one.
    pub fn payload(&self) -> Option<AqiData> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Successful feed payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AqiData {
    /// Primary index. Kept raw: the provider sends a number, or "-" when the
    /// station has no current value.
    #[serde(default)]
    pub aqi: Value,

    /// Per-pollutant sub-indicators.
    #[serde(default)]
    pub iaqi: PollutantIndices,

    /// Station metadata.
    pub city: Option<Station>,

    /// Observation timestamp.
    pub time: Option<ObservationTime>,

    /// Dominant pollutant name, when the provider reports one.
    pub dominentpol: Option<String>,
}

/// Pollutant sub-indicators, in fallback priority order.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PollutantIndices {
    pub pm25: Option<SubIndex>,
    pub pm10: Option<SubIndex>,
    pub o3: Option<SubIndex>,
    pub no2: Option<SubIndex>,
    pub so2: Option<SubIndex>,
    pub co: Option<SubIndex>,
}

/// A single sub-indicator value.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SubIndex {
    pub v: f64,
}

/// Reporting station metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    pub name: Option<String>,
    /// Station coordinates in whatever shape the provider chose; see
    /// [`parse_station_coords`].
    #[serde(default)]
    pub geo: Value,
}

/// Observation timestamp container.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationTime {
    pub s: Option<String>,
}

/// Extract a usable index from the payload.
///
/// The primary `aqi` field is accepted only if numeric and > 0. Otherwise the
/// sub-indicators are scanned in priority order (pm25, pm10, o3, no2, so2,
/// co) and the first present value wins, rounded to the nearest integer.
pub fn derive_index(data: &AqiData) -> Option<i64> {
    if let Some(primary) = numeric(&data.aqi) {
        if primary > 0.0 {
            return Some(primary.round() as i64);
        }
    }

    let fallback_order = [
        data.iaqi.pm25,
        data.iaqi.pm10,
        data.iaqi.o3,
        data.iaqi.no2,
        data.iaqi.so2,
        data.iaqi.co,
    ];
    fallback_order
        .iter()
        .find_map(|sub| sub.map(|s| s.v.round() as i64))
}

/// Parse station coordinates from any of the shapes the provider emits:
/// a two-element `[lat, lng]` array, a delimited string of two numbers, or
/// an object with latitude/longitude (or alias) keys.
pub fn parse_station_coords(geo: &Value) -> Option<Coordinates> {
    if let Some(arr) = geo.as_array() {
        if arr.len() != 2 {
            return None;
        }
        let lat = numeric(&arr[0])?;
        let lng = numeric(&arr[1])?;
        return Some(Coordinates::new(lat, lng));
    }

    if let Some(s) = geo.as_str() {
        let parts: Vec<f64> = s
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse().ok())
            .collect();
        if parts.len() == 2 {
            return Some(Coordinates::new(parts[0], parts[1]));
        }
        return None;
    }

    if let Some(obj) = geo.as_object() {
        let lat = ["lat", "latitude"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(numeric)?;
        let lng = ["lng", "lon", "long", "longitude"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(numeric)?;
        return Some(Coordinates::new(lat, lng));
    }

    None
}

/// Coerce a JSON value to f64, accepting numbers and numeric strings.
fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
