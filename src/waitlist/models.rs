use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::BookingDetails;

/// Most waitlist entries notified for one freed slot
pub const OPPORTUNITY_BATCH: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WaitlistStatus {
    Active,
    Notified,
    Booked,
    Cancelled,
}

impl WaitlistStatus {
    /// Booked and cancelled entries can be reused by a new join
    pub fn is_terminal(&self) -> bool {
        matches!(self, WaitlistStatus::Booked | WaitlistStatus::Cancelled)
    }
}

/// A client's standing request for a currently unavailable service date
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub service_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time: Option<NaiveTime>,
    pub alternative_dates: Vec<NaiveDate>,
    /// Higher is served first
    pub priority: i32,
    pub status: WaitlistStatus,
    pub notes: Option<String>,
    pub notified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Whether `day` is the preferred date or one of the alternatives
    pub fn wants(&self, day: NaiveDate) -> bool {
        self.preferred_date == day || self.alternative_dates.contains(&day)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinWaitlistRequest {
    pub service_id: Uuid,
    /// Normalized to its calendar day
    pub preferred_date: DateTime<Utc>,
    pub preferred_time: Option<NaiveTime>,
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 alternative dates"))]
    pub alternative_dates: Vec<DateTime<Utc>>,
    #[validate(range(min = 0, max = 100, message = "Priority must be between 0 and 100"))]
    pub priority: Option<i32>,
    #[validate(length(max = 1000, message = "Notes must not exceed 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct NotifyWaitlistRequest {
    #[validate(range(min = 1, max = 168, message = "Offer must last between 1 and 168 hours"))]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConvertWaitlistRequest {
    pub booking_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Address must not exceed 500 characters"))]
    pub address: Option<String>,
}

/// Fields written when an entry (re)joins the waitlist
#[derive(Debug, Clone)]
pub struct WaitlistJoin {
    pub preferred_date: NaiveDate,
    pub preferred_time: Option<NaiveTime>,
    pub alternative_dates: Vec<NaiveDate>,
    pub priority: i32,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

/// Result of converting a notified entry
#[derive(Debug, Clone, Serialize)]
pub struct WaitlistConversion {
    pub entry: WaitlistEntry,
    pub booking: BookingDetails,
}
