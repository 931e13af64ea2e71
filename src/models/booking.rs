use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Scheduled,
    InProgress,
    Arrived,
    Completed,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Arrived => "arrived",
            BookingStatus::Completed => "completed",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Rejected)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    /// Wall-clock schedule as entered upstream; parsed leniently on use.
    pub date: String,
    pub time: String,
    pub service_coordinates: GeoPoint,
    /// Service type, address text, price and the like; never interpreted here.
    #[serde(default)]
    pub details: serde_json::Value,
    pub status: BookingStatus,
    pub reject_reason: Option<String>,
    pub arrival_otp: Option<String>,
    /// Single-shot issuance guard, kept on the record itself so concurrent
    /// viewers race on the store, not on client-local memory.
    pub otp_issued: bool,
    pub otp_issued_at: Option<DateTime<Utc>>,
    pub otp_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
