//! External collaborators for air-quality monitoring.
//!
//! This module provides clients for the three upstream HTTP services the
//! monitor depends on. Each client takes its base URL at construction so
//! tests can point it at a local mock server.
//!
//! # Collaborators
//!
//! - [`aqi`]: WAQI-style air-quality feed, queried by city name or by
//!   `geo:lat;lng`
//! - [`ip_geo`]: IP-based geolocation, the fallback when no position fix is
//!   available
//! - [`geocode`]: reverse geocoding of coordinates to a display name

pub mod aqi;
pub mod geocode;
pub mod ip_geo;

pub use aqi::AqiClient;
pub use geocode::GeocodeClient;
pub use ip_geo::IpLocateClient;

use std::time::Duration;

/// Request timeout shared by all collaborator clients.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("airwatch/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by all collaborators.
pub(crate) fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
}
