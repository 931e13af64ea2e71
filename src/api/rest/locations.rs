use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::patch;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::{GeoPoint, LiveLocation};
use crate::state::AppState;
use crate::tracking::publisher::{self, LocationWrite};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/providers/:id/location",
        patch(update_provider_location).get(get_provider_location),
    )
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
    /// Device-side capture time; defaults to receipt time.
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct LocationWriteResponse {
    pub applied: bool,
    pub dropped: Option<&'static str>,
    pub location: Option<LiveLocation>,
}

async fn update_provider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<LocationWriteResponse>, AppError> {
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest(
            "location coordinates are out of range".to_string(),
        ));
    }

    let response = match publisher::publish_location(&state, id, payload.location, payload.recorded_at)
    {
        LocationWrite::Applied(location) => LocationWriteResponse {
            applied: true,
            dropped: None,
            location: Some(location),
        },
        LocationWrite::Stale => LocationWriteResponse {
            applied: false,
            dropped: Some("stale"),
            location: None,
        },
        LocationWrite::RateLimited => LocationWriteResponse {
            applied: false,
            dropped: Some("rate-limited"),
            location: None,
        },
    };

    Ok(Json(response))
}

async fn get_provider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LiveLocation>, AppError> {
    state
        .locations
        .get(&id)
        .map(|entry| Json(entry.clone()))
        .ok_or_else(|| AppError::LocationUnavailable("waiting for provider location".to_string()))
}
