use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use crate::config::RouteProviderConfig;
use crate::models::location::GeoPoint;
use crate::models::route::{RouteConfidence, RouteSnapshot};
use crate::routing::{RouteProvider, RoutingError};

/// Directions client for an openrouteservice-style API: POST with a
/// `[lng, lat]` coordinate pair list, API key in the Authorization header.
pub struct HttpRouteProvider {
    name: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpRouteProvider {
    pub fn new(config: &RouteProviderConfig, timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RoutingError::Config(format!("{}: {err}", config.name)))?;

        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

impl RouteProvider for HttpRouteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSnapshot, RoutingError> {
        let body = serde_json::json!({
            "coordinates": [[from.lng, from.lat], [to.lng, to.lat]]
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RoutingError::Request {
                provider: self.name.clone(),
                source: err,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::BadStatus {
                provider: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: DirectionsResponse = response
            .json()
            .await
            .map_err(|_| RoutingError::MalformedBody(self.name.clone()))?;

        snapshot_from(&self.name, parsed)
    }
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    summary: DirectionsSummary,
    #[serde(default)]
    geometry: DirectionsGeometry,
}

#[derive(Deserialize)]
struct DirectionsSummary {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

#[derive(Deserialize, Default)]
struct DirectionsGeometry {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

fn snapshot_from(provider: &str, parsed: DirectionsResponse) -> Result<RouteSnapshot, RoutingError> {
    let route = parsed
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::MalformedBody(provider.to_string()))?;

    // A well-formed answer with no geometry is as useful as an outage.
    if route.geometry.coordinates.is_empty() {
        return Err(RoutingError::EmptyRoute(provider.to_string()));
    }

    let points = route
        .geometry
        .coordinates
        .iter()
        .map(|[lng, lat]| GeoPoint {
            lat: *lat,
            lng: *lng,
        })
        .collect();

    Ok(RouteSnapshot {
        distance_km: route.summary.distance / 1000.0,
        duration_secs: route.summary.duration,
        points,
        confidence: RouteConfidence::Road,
        computed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Result<RouteSnapshot, RoutingError> {
        let response: DirectionsResponse = serde_json::from_value(value).expect("deserializable");
        snapshot_from("primary", response)
    }

    #[test]
    fn well_formed_response_becomes_a_road_snapshot() {
        let snapshot = parse(json!({
            "routes": [{
                "summary": { "distance": 4200.0, "duration": 560.0 },
                "geometry": { "coordinates": [[13.39, 52.51], [13.40, 52.52], [13.42, 52.54]] }
            }]
        }))
        .unwrap();

        assert_eq!(snapshot.confidence, RouteConfidence::Road);
        assert!((snapshot.distance_km - 4.2).abs() < 1e-9);
        assert!((snapshot.duration_secs - 560.0).abs() < 1e-9);
        assert_eq!(snapshot.points.len(), 3);
        assert!((snapshot.points[0].lat - 52.51).abs() < 1e-9);
        assert!((snapshot.points[0].lng - 13.39).abs() < 1e-9);
    }

    #[test]
    fn empty_geometry_counts_as_a_failure() {
        let err = parse(json!({
            "routes": [{
                "summary": { "distance": 4200.0, "duration": 560.0 },
                "geometry": { "coordinates": [] }
            }]
        }))
        .unwrap_err();

        assert!(matches!(err, RoutingError::EmptyRoute(_)));
    }

    #[test]
    fn missing_routes_count_as_malformed() {
        let err = parse(json!({ "routes": [] })).unwrap_err();
        assert!(matches!(err, RoutingError::MalformedBody(_)));
    }

    #[test]
    fn unexpected_body_shape_does_not_panic() {
        let value = json!({ "message": "quota exceeded" });
        assert!(serde_json::from_value::<DirectionsResponse>(value).is_err());
    }
}
