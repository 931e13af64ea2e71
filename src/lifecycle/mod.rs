//! Booking lifecycle. Every transition is validated against the booking's
//! current status inside its map entry lock, so duplicate or out-of-order
//! client actions fail with `InvalidTransition` instead of corrupting state.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::event::TrackingEvent;
use crate::state::AppState;
use crate::visibility::schedule;

/// Provider accepts a pending booking. An appointment already inside the
/// auto-start window (or in the past) goes straight to in-progress; a
/// parseable future appointment becomes scheduled; an unreadable schedule
/// leaves the booking merely accepted.
pub fn accept(state: &AppState, id: Uuid) -> Result<Booking, AppError> {
    let (date, time) = {
        let entry = state
            .bookings
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;
        (entry.date.clone(), entry.time.clone())
    };

    let target = match schedule::parse(&date, &time) {
        Ok(at) => {
            let remaining = schedule::seconds_until(at, Utc::now());
            if remaining <= state.config.auto_start_window_mins * 60 {
                BookingStatus::InProgress
            } else {
                BookingStatus::Scheduled
            }
        }
        Err(_) => BookingStatus::Accepted,
    };

    transition(state, id, "accept", &[BookingStatus::Pending], target, |_| {})
}

pub fn reject(state: &AppState, id: Uuid, reason: Option<String>) -> Result<Booking, AppError> {
    transition(
        state,
        id,
        "reject",
        &[BookingStatus::Pending, BookingStatus::Scheduled],
        BookingStatus::Rejected,
        |booking| booking.reject_reason = reason,
    )
}

/// Proximity-confirmed arrival. Installs the code and the issuance stamp in
/// the same entry lock as the status write. Calling it again while already
/// arrived is a no-op, never a second code.
pub fn mark_arrived(
    state: &AppState,
    id: Uuid,
    otp: &str,
    issued_at: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let mut entry = state
        .bookings
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    match entry.status {
        BookingStatus::Arrived => Ok(entry.clone()),
        BookingStatus::Accepted | BookingStatus::Scheduled | BookingStatus::InProgress => {
            entry.status = BookingStatus::Arrived;
            entry.arrival_otp = Some(otp.to_string());
            entry.otp_issued_at = Some(issued_at);
            entry.updated_at = Utc::now();
            let booking = entry.clone();
            drop(entry);
            committed(state, &booking);
            Ok(booking)
        }
        from => Err(AppError::InvalidTransition {
            action: "mark arrival for",
            from,
        }),
    }
}

/// Customer hands the provider the arrival code; a match starts the service.
/// A mismatch leaves the booking arrived and is reported, never swallowed.
pub fn verify_and_start(state: &AppState, id: Uuid, code: &str) -> Result<Booking, AppError> {
    let mut entry = state
        .bookings
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    if entry.status != BookingStatus::Arrived {
        return Err(AppError::InvalidTransition {
            action: "verify arrival code for",
            from: entry.status,
        });
    }

    let issued = entry
        .arrival_otp
        .clone()
        .ok_or_else(|| AppError::Internal("arrived booking carries no arrival code".to_string()))?;

    if issued != code.trim() {
        return Err(AppError::InvalidOtp);
    }

    entry.status = BookingStatus::InProgress;
    entry.otp_verified_at = Some(Utc::now());
    entry.updated_at = Utc::now();
    let booking = entry.clone();
    drop(entry);
    committed(state, &booking);
    Ok(booking)
}

pub fn complete(state: &AppState, id: Uuid) -> Result<Booking, AppError> {
    transition(
        state,
        id,
        "complete",
        &[BookingStatus::InProgress],
        BookingStatus::Completed,
        |_| {},
    )
}

fn transition(
    state: &AppState,
    id: Uuid,
    action: &'static str,
    allowed_from: &[BookingStatus],
    to: BookingStatus,
    mutate: impl FnOnce(&mut Booking),
) -> Result<Booking, AppError> {
    let mut entry = state
        .bookings
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    if !allowed_from.contains(&entry.status) {
        return Err(AppError::InvalidTransition {
            action,
            from: entry.status,
        });
    }

    entry.status = to;
    mutate(&mut entry);
    entry.updated_at = Utc::now();
    let booking = entry.clone();
    drop(entry);

    committed(state, &booking);
    Ok(booking)
}

fn committed(state: &AppState, booking: &Booking) {
    state
        .metrics
        .booking_transitions_total
        .with_label_values(&[booking.status.as_str()])
        .inc();

    let _ = state.events_tx.send(TrackingEvent::Status {
        booking_id: booking.id,
        status: booking.status,
        at: booking.updated_at,
    });

    info!(booking_id = %booking.id, status = %booking.status, "booking transitioned");
}
