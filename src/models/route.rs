use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteConfidence {
    /// Polyline obtained from a road routing provider.
    Road,
    /// Great-circle estimate used when every provider is unavailable.
    StraightLine,
}

/// Computed estimate of the path between the provider and the service
/// address. Derived on a cadence, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub distance_km: f64,
    pub duration_secs: f64,
    pub points: Vec<GeoPoint>,
    pub confidence: RouteConfidence,
    pub computed_at: DateTime<Utc>,
}
