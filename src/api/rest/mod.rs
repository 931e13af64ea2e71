pub mod bookings;
pub mod locations;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::models::booking::Booking;
use crate::state::AppState;
use crate::visibility::{self, ViewerRole};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(bookings::router())
        .merge(locations::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws/bookings/:id", get(ws::tracking_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Every tracking read path goes through the visibility gate.
pub(crate) fn ensure_can_view(
    state: &AppState,
    booking: &Booking,
    role: ViewerRole,
) -> Result<(), AppError> {
    let visibility = visibility::can_view(
        role,
        booking,
        Utc::now(),
        &state.config.visibility_policy(),
    );
    if visibility.allowed {
        Ok(())
    } else {
        Err(AppError::TrackingBlocked(
            visibility
                .reason
                .unwrap_or_else(|| "not permitted".to_string()),
        ))
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    bookings: usize,
    providers_reporting: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        bookings: state.bookings.len(),
        providers_reporting: state.locations.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
