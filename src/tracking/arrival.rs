//! Proximity-triggered arrival verification. Watches the gap between the
//! provider's live location and the service address; crossing the threshold
//! issues a one-time arrival code exactly once per booking.

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::lifecycle;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::event::TrackingEvent;
use crate::models::location::LiveLocation;
use crate::state::AppState;

pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

/// Issue a code and mark the booking arrived. The `otp_issued` flag on the
/// record is the single-shot guard: losing the compare-and-set means another
/// sample or viewer already issued, and the call degrades to a no-op read.
pub fn issue_arrival_otp(state: &AppState, booking_id: Uuid) -> Result<Booking, AppError> {
    if !claim_issuance(state, booking_id)? {
        return state
            .bookings
            .get(&booking_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")));
    }

    let otp = generate_otp();
    match lifecycle::mark_arrived(state, booking_id, &otp, Utc::now()) {
        Ok(booking) => {
            state.metrics.otp_issued_total.inc();
            info!(%booking_id, "arrival code issued");
            Ok(booking)
        }
        Err(err) => {
            // leave the guard clear so the next sample can retry
            release_issuance(state, booking_id);
            Err(err)
        }
    }
}

/// Provider-requested issuance for when route-based detection under-fires.
/// Allowed only near the address; reuses the single-shot guard.
pub fn request_manual_otp(state: &AppState, booking_id: Uuid) -> Result<Booking, AppError> {
    let booking = state
        .bookings
        .get(&booking_id)
        .map(|entry| entry.clone())
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

    match booking.status {
        BookingStatus::Arrived => return Ok(booking),
        BookingStatus::Accepted | BookingStatus::Scheduled | BookingStatus::InProgress => {}
        from => {
            return Err(AppError::InvalidTransition {
                action: "request an arrival code for",
                from,
            });
        }
    }

    let location = state
        .locations
        .get(&booking.provider_id)
        .map(|entry| entry.clone())
        .ok_or_else(|| {
            AppError::LocationUnavailable("no live location reported yet".to_string())
        })?;

    let distance_km = haversine_km(location.position, booking.service_coordinates);
    let threshold_km = state.config.manual_otp_threshold_km;
    if distance_km > threshold_km {
        return Err(AppError::BadRequest(format!(
            "provider is {:.0} m from the service address; arrival codes can be requested within {:.0} m",
            distance_km * 1000.0,
            threshold_km * 1000.0
        )));
    }

    issue_arrival_otp(state, booking_id)
}

/// Per-booking monitor: reacts to every pushed sample and, as a safety net,
/// polls on a fixed interval in case pushes stop. Exits once the booking no
/// longer needs arrival detection or the session shuts down.
pub async fn run_arrival_monitor(
    state: Arc<AppState>,
    booking_id: Uuid,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(provider_id) = state.bookings.get(&booking_id).map(|entry| entry.provider_id) else {
        warn!(%booking_id, "arrival monitor refused: unknown booking");
        return;
    };

    let mut events = state.subscribe_events();
    let mut poll = tokio::time::interval(state.config.arrival_poll_interval);
    info!(%booking_id, "arrival monitor started");

    loop {
        let sample = tokio::select! {
            _ = shutdown.changed() => break,
            _ = poll.tick() => None,
            event = events.recv() => match event {
                Ok(TrackingEvent::Location { location }) if location.provider_id == provider_id => {
                    Some(location)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if check_proximity(&state, booking_id, sample).is_break() {
            break;
        }
    }

    info!(%booking_id, "arrival monitor stopped");
}

fn check_proximity(
    state: &AppState,
    booking_id: Uuid,
    sample: Option<LiveLocation>,
) -> ControlFlow<()> {
    let Some(booking) = state.bookings.get(&booking_id).map(|entry| entry.clone()) else {
        return ControlFlow::Break(());
    };

    match booking.status {
        BookingStatus::Arrived | BookingStatus::Completed | BookingStatus::Rejected => {
            return ControlFlow::Break(());
        }
        // verified and underway; an auto-started visit still awaits arrival
        BookingStatus::InProgress if booking.otp_issued => return ControlFlow::Break(()),
        BookingStatus::Pending => return ControlFlow::Continue(()),
        _ => {}
    }

    let location = match sample {
        Some(location) => location,
        None => match state.locations.get(&booking.provider_id) {
            Some(entry) => entry.clone(),
            None => return ControlFlow::Continue(()),
        },
    };

    let distance_km = haversine_km(location.position, booking.service_coordinates);
    if distance_km <= state.config.arrival_threshold_km {
        match issue_arrival_otp(state, booking.id) {
            Ok(_) => return ControlFlow::Break(()),
            Err(err) => {
                warn!(booking_id = %booking.id, error = %err, "arrival code issuance failed; will retry on next sample");
            }
        }
    }

    ControlFlow::Continue(())
}

fn claim_issuance(state: &AppState, booking_id: Uuid) -> Result<bool, AppError> {
    let mut entry = state
        .bookings
        .get_mut(&booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

    if entry.otp_issued {
        return Ok(false);
    }
    entry.otp_issued = true;
    Ok(true)
}

fn release_issuance(state: &AppState, booking_id: Uuid) {
    if let Some(mut entry) = state.bookings.get_mut(&booking_id) {
        entry.otp_issued = false;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::models::location::GeoPoint;
    use crate::tracking::publisher;

    fn test_state() -> AppState {
        AppState::new(Config::default()).expect("state")
    }

    fn service_point() -> GeoPoint {
        GeoPoint {
            lat: 52.52,
            lng: 13.405,
        }
    }

    fn seed_booking(state: &AppState, status: BookingStatus) -> Booking {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let at = now + chrono::Duration::minutes(40);
        let booking = Booking {
            id,
            customer_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            service_coordinates: service_point(),
            details: serde_json::Value::Null,
            status,
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

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..32 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn issuance_happens_at_most_once() {
        let state = test_state();
        let booking = seed_booking(&state, BookingStatus::Scheduled);

        let first = issue_arrival_otp(&state, booking.id).unwrap();
        assert_eq!(first.status, BookingStatus::Arrived);
        let code = first.arrival_otp.clone().unwrap();

        let second = issue_arrival_otp(&state, booking.id).unwrap();
        assert_eq!(second.arrival_otp.as_deref(), Some(code.as_str()));
        assert!(second.otp_issued);
    }

    #[test]
    fn failed_issuance_releases_the_guard() {
        let state = test_state();
        let booking = seed_booking(&state, BookingStatus::Pending);

        let err = issue_arrival_otp(&state, booking.id).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert!(!state.bookings.get(&booking.id).unwrap().otp_issued);
    }

    #[test]
    fn manual_request_requires_a_reported_location() {
        let state = test_state();
        let booking = seed_booking(&state, BookingStatus::Scheduled);

        let err = request_manual_otp(&state, booking.id).unwrap_err();
        assert!(matches!(err, AppError::LocationUnavailable(_)));
    }

    #[test]
    fn manual_request_far_from_the_address_is_refused() {
        let state = test_state();
        let booking = seed_booking(&state, BookingStatus::Scheduled);
        publisher::publish_location(
            &state,
            booking.provider_id,
            GeoPoint {
                lat: 52.53,
                lng: 13.42,
            },
            None,
        );

        let err = request_manual_otp(&state, booking.id).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(!state.bookings.get(&booking.id).unwrap().otp_issued);
    }

    #[test]
    fn manual_request_nearby_issues_and_arrives() {
        let state = test_state();
        let booking = seed_booking(&state, BookingStatus::Scheduled);
        publisher::publish_location(&state, booking.provider_id, service_point(), None);

        let arrived = request_manual_otp(&state, booking.id).unwrap();
        assert_eq!(arrived.status, BookingStatus::Arrived);
        assert!(arrived.arrival_otp.is_some());
        assert!(arrived.otp_issued_at.is_some());
    }

    #[tokio::test]
    async fn monitor_issues_when_the_provider_reaches_the_address() {
        let state = Arc::new(test_state());
        let booking = seed_booking(&state, BookingStatus::Scheduled);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_arrival_monitor(state.clone(), booking.id, shutdown_rx));

        // let the monitor subscribe before the sample lands
        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher::publish_location(&state, booking.provider_id, service_point(), None);

        let mut arrived = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if state.bookings.get(&booking.id).unwrap().status == BookingStatus::Arrived {
                arrived = true;
                break;
            }
        }
        assert!(arrived, "proximity should have issued an arrival code");

        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }
}
