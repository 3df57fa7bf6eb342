//! IP-based geolocation client.
//!
//! The fallback collaborator when no position fix is available: one request,
//! no parameters, coordinates plus optional city/region/country strings back.

use serde::Deserialize;
use tracing::debug;

use crate::model::Coordinates;

/// Client for the IP-geolocation collaborator.
#[derive(Clone)]
pub struct IpLocateClient {
    client: reqwest::Client,
    base_url: String,
}

impl IpLocateClient {
    /// Create a client against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: super::build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up the approximate location of the caller's public IP.
    pub async fn locate(&self) -> Result<IpLocation, reqwest::Error> {
        let url = format!("{}/json", self.base_url);
        debug!("looking up approximate location via IP");
        self.client.get(&url).send().await?.json().await
    }
}

/// Response from the IP-geolocation collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct IpLocation {
    pub status: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub city: Option<String>,
    #[serde(rename = "regionName")]
    pub region_name: Option<String>,
    pub country: Option<String>,
}

impl IpLocation {
    /// The service reports `status: "fail"` on lookup failure.
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() != Some("fail")
    }

    /// Coordinates, when both axes are present.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    /// Compose a display label from city/region/country, skipping whatever is
    /// missing.
    pub fn composed_label(&self) -> String {
        let parts: Vec<&str> = [
            self.city.as_deref(),
            self.region_name.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();

        if parts.is_empty() {
            "Approximate location".to_string()
        } else {
            parts.join(", ")
        }
    }
}
