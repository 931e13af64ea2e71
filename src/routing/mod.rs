//! Road-route resolution with failover: an ordered provider chain, and a
//! great-circle estimate once every provider is exhausted. Routing outages
//! degrade the snapshot; they are never surfaced as user errors.

pub mod http;

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::geo::haversine_km;
use crate::models::location::GeoPoint;
use crate::models::route::{RouteConfidence, RouteSnapshot};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("provider {provider} returned status {status}")]
    BadStatus { provider: String, status: u16 },

    #[error("provider {provider} request failed: {source}")]
    Request {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider {0} returned a malformed body")]
    MalformedBody(String),

    #[error("provider {0} returned a route with no points")]
    EmptyRoute(String),

    #[error("no routing provider available")]
    Unavailable,

    #[error("provider setup failed: {0}")]
    Config(String),
}

pub trait RouteProvider {
    fn name(&self) -> &str;

    fn resolve(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> impl Future<Output = Result<RouteSnapshot, RoutingError>> + Send;
}

pub struct RouteChain<P> {
    providers: Vec<P>,
    fallback_speed_kmh: f64,
}

impl<P: RouteProvider> RouteChain<P> {
    pub fn new(providers: Vec<P>, fallback_speed_kmh: f64) -> Self {
        Self {
            providers,
            fallback_speed_kmh,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Try each provider in order; `Unavailable` once the chain is spent.
    pub async fn resolve(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<RouteSnapshot, RoutingError> {
        for provider in &self.providers {
            match provider.resolve(from, to).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "route provider failed; trying next");
                }
            }
        }
        Err(RoutingError::Unavailable)
    }

    /// Great-circle estimate at an assumed average speed. No polyline.
    pub fn straight_line(&self, from: GeoPoint, to: GeoPoint) -> RouteSnapshot {
        let distance_km = haversine_km(from, to);
        RouteSnapshot {
            distance_km,
            duration_secs: distance_km / self.fallback_speed_kmh * 3600.0,
            points: Vec::new(),
            confidence: RouteConfidence::StraightLine,
            computed_at: Utc::now(),
        }
    }
}

/// Resolve through the chain, degrading to the straight-line estimate.
pub async fn resolve_snapshot(state: &AppState, from: GeoPoint, to: GeoPoint) -> RouteSnapshot {
    let started = Instant::now();
    match state.route_chain.resolve(from, to).await {
        Ok(snapshot) => {
            observe(state, "road", started);
            snapshot
        }
        Err(err) => {
            debug!(error = %err, "routing unavailable; using straight-line estimate");
            observe(state, "fallback", started);
            state.route_chain.straight_line(from, to)
        }
    }
}

fn observe(state: &AppState, outcome: &str, started: Instant) {
    state
        .metrics
        .route_resolve_seconds
        .with_label_values(&[outcome])
        .observe(started.elapsed().as_secs_f64());
    state
        .metrics
        .route_resolutions_total
        .with_label_values(&[outcome])
        .inc();
}
