use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::ensure_can_view;
use crate::error::AppError;
use crate::lifecycle;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::location::GeoPoint;
use crate::models::route::RouteSnapshot;
use crate::routing;
use crate::state::AppState;
use crate::tracking::arrival;
use crate::visibility::{self, Visibility, ViewerRole};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/accept", post(accept_booking))
        .route("/bookings/:id/reject", post(reject_booking))
        .route("/bookings/:id/verify", post(verify_arrival_code))
        .route("/bookings/:id/complete", post(complete_booking))
        .route("/bookings/:id/arrival-code", post(request_arrival_code))
        .route("/bookings/:id/visibility", get(booking_visibility))
        .route("/bookings/:id/route", get(booking_route))
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub date: String,
    pub time: String,
    pub service_coordinates: GeoPoint,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct RoleQuery {
    pub role: ViewerRole,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    if !payload.service_coordinates.is_valid() {
        return Err(AppError::BadRequest(
            "service coordinates are out of range".to_string(),
        ));
    }

    let now = Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        customer_id: payload.customer_id,
        provider_id: payload.provider_id,
        date: payload.date,
        time: payload.time,
        service_coordinates: payload.service_coordinates,
        details: payload.details,
        status: BookingStatus::Pending,
        reject_reason: None,
        arrival_otp: None,
        otp_issued: false,
        otp_issued_at: None,
        otp_verified_at: None,
        created_at: now,
        updated_at: now,
    };

    state.bookings.insert(booking.id, booking.clone());
    Ok(Json(booking))
}

async fn list_bookings(State(state): State<Arc<AppState>>) -> Json<Vec<Booking>> {
    let bookings = state
        .bookings
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(bookings)
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;
    Ok(Json(booking.value().clone()))
}

async fn accept_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    lifecycle::accept(&state, id).map(Json)
}

async fn reject_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<Booking>, AppError> {
    lifecycle::reject(&state, id, payload.reason).map(Json)
}

async fn verify_arrival_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<Booking>, AppError> {
    lifecycle::verify_and_start(&state, id, &payload.code).map(Json)
}

async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    lifecycle::complete(&state, id).map(Json)
}

async fn request_arrival_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    arrival::request_manual_otp(&state, id).map(Json)
}

async fn booking_visibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<Visibility>, AppError> {
    let booking = state
        .bookings
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    Ok(Json(visibility::can_view(
        query.role,
        &booking,
        Utc::now(),
        &state.config.visibility_policy(),
    )))
}

async fn booking_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<RouteSnapshot>, AppError> {
    let booking = state
        .bookings
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    ensure_can_view(&state, &booking, query.role)?;

    let origin = state
        .locations
        .get(&booking.provider_id)
        .map(|entry| entry.position)
        .ok_or_else(|| {
            AppError::LocationUnavailable("waiting for provider location".to_string())
        })?;

    let snapshot = routing::resolve_snapshot(&state, origin, booking.service_coordinates).await;
    Ok(Json(snapshot))
}
