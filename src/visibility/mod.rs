//! Decides whether a viewer may currently see live tracking for a booking.
//! Pure; callers re-evaluate on a timer to drive countdown displays.

pub mod schedule;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerRole {
    Customer,
    Provider,
}

#[derive(Debug, Clone, Copy)]
pub struct VisibilityPolicy {
    /// Customers may start watching this many minutes before the appointment.
    pub window_minutes: i64,
    /// Whether an unreadable schedule blocks instead of allows.
    pub fail_closed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Visibility {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl Visibility {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

pub fn can_view(
    role: ViewerRole,
    booking: &Booking,
    now: DateTime<Utc>,
    policy: &VisibilityPolicy,
) -> Visibility {
    // Service underway waives the time window for both roles.
    if matches!(
        booking.status,
        BookingStatus::InProgress | BookingStatus::Arrived
    ) {
        return Visibility::allowed();
    }

    // Providers self-service-start regardless of schedule.
    if role == ViewerRole::Provider {
        return Visibility::allowed();
    }

    if !matches!(
        booking.status,
        BookingStatus::Accepted | BookingStatus::Scheduled
    ) {
        let reason = match booking.status {
            BookingStatus::Pending => "booking has not been accepted yet".to_string(),
            BookingStatus::Rejected => "booking was rejected".to_string(),
            BookingStatus::Completed => "booking is already completed".to_string(),
            other => format!("booking is {other}"),
        };
        return Visibility::blocked(reason);
    }

    match schedule::parse(&booking.date, &booking.time) {
        Err(err) => {
            if policy.fail_closed {
                Visibility::blocked(format!("schedule cannot be read: {err}"))
            } else {
                Visibility::allowed()
            }
        }
        Ok(at) => {
            let remaining = schedule::seconds_until(at, now);
            let window = policy.window_minutes * 60;
            if remaining <= window {
                Visibility::allowed()
            } else {
                Visibility::blocked(format!(
                    "tracking opens in {}",
                    schedule::format_wait(remaining - window)
                ))
            }
        }
    }
}
