use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::booking::BookingStatus;
use crate::models::location::LiveLocation;
use crate::models::route::RouteSnapshot;

/// Push events fanned out to every open tracking view.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    Location {
        location: LiveLocation,
    },
    Route {
        booking_id: Uuid,
        snapshot: RouteSnapshot,
    },
    Status {
        booking_id: Uuid,
        status: BookingStatus,
        at: DateTime<Utc>,
    },
}
