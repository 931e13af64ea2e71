use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// The provider's most recently reported device coordinate. One record per
/// provider; `updated_at` never regresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveLocation {
    pub provider_id: Uuid,
    pub position: GeoPoint,
    pub updated_at: DateTime<Utc>,
}
