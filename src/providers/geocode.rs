//! Reverse-geocoding client.
//!
//! Nominatim-style: coordinates in, a formatted display name out. A missing
//! or error response maps to `Ok(None)` so the cache can fall back to a
//! coordinate-formatted label; only transport failures surface as `Err`.

use serde::Deserialize;
use tracing::debug;

use crate::model::Coordinates;

/// Client for the reverse-geocoding collaborator.
#[derive(Clone)]
pub struct GeocodeClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

impl GeocodeClient {
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

    /// Resolve coordinates to a formatted place name.
    pub async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, reqwest::Error> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&zoom=10",
            self.base_url, coords.lat, coords.lng
        );
        debug!(lat = coords.lat, lng = coords.lng, "reverse geocoding");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "reverse geocode returned non-success");
            return Ok(None);
        }

        let body: ReverseResponse = response.json().await?;
        if let Some(err) = body.error {
            debug!(error = %err, "reverse geocode reported an error");
            return Ok(None);
        }
        Ok(body.display_name)
    }
}
