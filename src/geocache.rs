//! Proximity-gated reverse-geocode cache.
//!
//! The dashboard re-resolves its display label every time coordinates move,
//! but position fixes jitter by a few meters. The cache keeps the last
//! resolved `(coords, label)` pair and skips the external call entirely when
//! the new coordinates are within the reuse epsilon of the cached point.
//! Failed resolutions are cached too, as a coordinate-formatted label, so a
//! dead geocoder is not re-queried on every jittered fix at the same spot.

use tracing::debug;

use crate::model::Coordinates;
use crate::providers::GeocodeClient;

/// Resolves coordinates to a human-readable label, reusing the last result
/// for nearby points.
pub struct ReverseGeocodeCache {
    client: GeocodeClient,
    epsilon_deg: f64,
    last: Option<(Coordinates, String)>,
}

impl ReverseGeocodeCache {
    pub fn new(client: GeocodeClient, epsilon_deg: f64) -> Self {
        Self {
            client,
            epsilon_deg,
            last: None,
        }
    }

    /// Resolve coordinates to a display label.
    ///
    /// Never fails: any collaborator failure falls back to a
    /// coordinate-formatted label, which is cached like a success.
    pub async fn resolve(&mut self, coords: Coordinates) -> String {
        if let Some((cached, label)) = &self.last {
            if coords.is_near(cached, self.epsilon_deg) {
                debug!(label = %label, "reusing cached geocode label");
                return label.clone();
            }
        }

        let label = match self.client.reverse(coords).await {
            Ok(Some(name)) => name,
            Ok(None) => coords.display_label(),
            Err(e) => {
                debug!(error = %e, "reverse geocode failed; using coordinate label");
                coords.display_label()
            }
        };

        self.last = Some((coords, label.clone()));
        label
    }

    /// The most recently resolved label, if any.
    pub fn cached_label(&self) -> Option<&str> {
        self.last.as_ref().map(|(_, label)| label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EPSILON: f64 = 0.001;

    #[tokio::test]
    async fn test_nearby_resolution_skips_external_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "display_name": "Seattle, Washington" })),
            )
            .expect(1) // the second resolve must not reach the server
            .mount(&server)
            .await;

        let client = GeocodeClient::new(&server.uri()).expect("client");
        let mut cache = ReverseGeocodeCache::new(client, EPSILON);

        let first = cache.resolve(Coordinates::new(47.6062, -122.3321)).await;
        assert_eq!(first, "Seattle, Washington");

        // Within epsilon of the first point: cached label, no call
        let second = cache.resolve(Coordinates::new(47.6065, -122.3318)).await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_moving_far_re_resolves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "display_name": "Somewhere" })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = GeocodeClient::new(&server.uri()).expect("client");
        let mut cache = ReverseGeocodeCache::new(client, EPSILON);

        cache.resolve(Coordinates::new(47.0, -122.0)).await;
        cache.resolve(Coordinates::new(48.0, -122.0)).await;
    }

    #[tokio::test]
    async fn test_failure_caches_coordinate_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1) // repeated failures at the same spot do not retry
            .mount(&server)
            .await;

        let client = GeocodeClient::new(&server.uri()).expect("client");
        let mut cache = ReverseGeocodeCache::new(client, EPSILON);

        let coords = Coordinates::new(47.6062, -122.3321);
        let label = cache.resolve(coords).await;
        assert_eq!(label, "47.6062, -122.3321");

        let again = cache.resolve(coords).await;
        assert_eq!(again, label);
    }

    #[tokio::test]
    async fn test_error_body_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let client = GeocodeClient::new(&server.uri()).expect("client");
        let mut cache = ReverseGeocodeCache::new(client, EPSILON);

        let label = cache.resolve(Coordinates::new(0.0, 0.0)).await;
        assert_eq!(label, "0.0000, 0.0000");
    }
}
