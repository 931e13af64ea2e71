use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::bookings::RoleQuery;
use crate::api::rest::ensure_can_view;
use crate::error::AppError;
use crate::models::booking::Booking;
use crate::models::event::TrackingEvent;
use crate::state::AppState;
use crate::tracking::session::TrackingSession;
use crate::tracking::subscriber::LocationWatch;
use crate::visibility::{self, ViewerRole};

pub async fn tracking_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    Query(query): Query<RoleQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .bookings
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    ensure_can_view(&state, &booking, query.role)?;

    let role = query.role;
    Ok(ws.on_upgrade(move |socket| handle_tracking_socket(socket, state, booking, role)))
}

async fn handle_tracking_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    booking: Booking,
    role: ViewerRole,
) {
    let (mut sender, mut receiver) = socket.split();
    let session = TrackingSession::spawn(state.clone(), &booking);

    let mut events = state.subscribe_events();
    let mut locations = LocationWatch::new(
        state.subscribe_events(),
        booking.provider_id,
        state.config.subscribe_min_interval,
    );
    // countdown re-evaluation; the connect-time check already ran
    let mut gate_check = tokio::time::interval(Duration::from_secs(60));
    gate_check.tick().await;

    info!(booking_id = %booking.id, "tracking client connected");

    loop {
        let outgoing = tokio::select! {
            message = receiver.next() => match message {
                Some(Ok(_)) => None,
                _ => break,
            },
            maybe = locations.next_location() => match maybe {
                Some(location) => to_text(&TrackingEvent::Location { location }),
                None => break,
            },
            event = events.recv() => match event {
                Ok(event) => match event {
                    TrackingEvent::Route { booking_id, .. }
                    | TrackingEvent::Status { booking_id, .. }
                        if booking_id == booking.id =>
                    {
                        to_text(&event)
                    }
                    _ => None,
                },
                Err(broadcast::error::RecvError::Lagged(_)) => None,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = gate_check.tick() => {
                let Some(current) = state.bookings.get(&booking.id).map(|entry| entry.clone())
                else {
                    break;
                };
                let visibility = visibility::can_view(
                    role,
                    &current,
                    Utc::now(),
                    &state.config.visibility_policy(),
                );
                if visibility.allowed {
                    None
                } else {
                    let notice =
                        json!({ "type": "blocked", "reason": visibility.reason }).to_string();
                    let _ = sender.send(Message::Text(notice)).await;
                    break;
                }
            }
        };

        if let Some(text) = outgoing {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    }

    session.close();
    info!(booking_id = %booking.id, "tracking client disconnected");
}

fn to_text(event: &TrackingEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(err) => {
            warn!(error = %err, "failed to serialize tracking event");
            None
        }
    }
}
