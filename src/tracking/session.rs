//! One session per open tracking view. The session owns the arrival monitor
//! and the route recompute timer; both select on a shared shutdown channel
//! so closing the view stops them deterministically. A leaked timer would
//! keep issuing codes against a view nobody is watching.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::booking::Booking;
use crate::models::event::TrackingEvent;
use crate::models::location::GeoPoint;
use crate::models::route::RouteConfidence;
use crate::routing;
use crate::state::AppState;
use crate::tracking::arrival;

pub struct TrackingSession {
    state: Arc<AppState>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TrackingSession {
    pub fn spawn(state: Arc<AppState>, booking: &Booking) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        state.metrics.active_tracking_sessions.inc();

        if !booking.status.is_terminal() {
            tasks.push(tokio::spawn(arrival::run_arrival_monitor(
                state.clone(),
                booking.id,
                shutdown_rx.clone(),
            )));
        }
        tasks.push(tokio::spawn(run_route_recompute(
            state.clone(),
            booking.id,
            shutdown_rx,
        )));

        Self {
            state,
            shutdown,
            tasks,
        }
    }

    /// After this returns, no timer owned by the view fires again.
    pub fn close(self) {
        let _ = self.shutdown.send(true);
        for task in &self.tasks {
            task.abort();
        }
        self.state.metrics.active_tracking_sessions.dec();
    }
}

async fn run_route_recompute(
    state: Arc<AppState>,
    booking_id: Uuid,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cycle = tokio::time::interval(state.config.route_recompute_interval);
    info!(%booking_id, "route recompute started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = cycle.tick() => {}
        }

        let Some(booking) = state.bookings.get(&booking_id).map(|entry| entry.clone()) else {
            break;
        };
        if booking.status.is_terminal() {
            break;
        }
        let Some(origin) = state
            .locations
            .get(&booking.provider_id)
            .map(|entry| entry.position)
        else {
            // nothing to draw until the provider reports
            continue;
        };

        recompute_cycle(&state, &booking, origin, &mut shutdown).await;
    }

    info!(%booking_id, "route recompute stopped");
}

/// One cadence cycle: resolve, publish the snapshot, and when the result is
/// degraded retry the providers with doubling backoff. The retry budget
/// resets on every fresh cycle.
async fn recompute_cycle(
    state: &AppState,
    booking: &Booking,
    origin: GeoPoint,
    shutdown: &mut watch::Receiver<bool>,
) {
    let destination = booking.service_coordinates;
    let snapshot = routing::resolve_snapshot(state, origin, destination).await;
    let degraded = snapshot.confidence == RouteConfidence::StraightLine;
    let _ = state.events_tx.send(TrackingEvent::Route {
        booking_id: booking.id,
        snapshot,
    });

    if !degraded || state.route_chain.is_empty() {
        return;
    }

    let mut delay = state.config.route_retry_base;
    for _ in 0..state.config.route_retry_limit {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        // the provider keeps moving between attempts
        let origin = state
            .locations
            .get(&booking.provider_id)
            .map(|entry| entry.position)
            .unwrap_or(origin);

        match state.route_chain.resolve(origin, destination).await {
            Ok(snapshot) => {
                let _ = state.events_tx.send(TrackingEvent::Route {
                    booking_id: booking.id,
                    snapshot,
                });
                return;
            }
            Err(err) => warn!(booking_id = %booking.id, error = %err, "route retry failed"),
        }
        delay *= 2;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::Config;
    use crate::models::booking::BookingStatus;

    fn seed_booking(state: &AppState) -> Booking {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let booking = Booking {
            id,
            customer_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            date: "2026-05-01".to_string(),
            time: "10:00".to_string(),
            service_coordinates: GeoPoint {
                lat: 52.52,
                lng: 13.405,
            },
            details: serde_json::Value::Null,
            status: BookingStatus::Scheduled,
            reject_reason: None,
            arrival_otp: None,
            otp_issued: false,
            otp_issued_at: None,
            otp_verified_at: None,
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(id, booking.clone());
        booking
    }

    #[tokio::test]
    async fn close_tears_the_view_down() {
        let state = Arc::new(AppState::new(Config::default()).expect("state"));
        let booking = seed_booking(&state);

        let session = TrackingSession::spawn(state.clone(), &booking);
        assert_eq!(state.metrics.active_tracking_sessions.get(), 1);

        session.close();
        assert_eq!(state.metrics.active_tracking_sessions.get(), 0);
    }
}
