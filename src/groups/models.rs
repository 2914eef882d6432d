use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Open,
    Confirmed,
    Cancelled,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Open => "open",
            GroupStatus::Confirmed => "confirmed",
            GroupStatus::Cancelled => "cancelled",
        }
    }

    /// Open groups take new participants; a confirmed group is full
    pub fn ensure_accepting(&self) -> crate::error::DomainResult<()> {
        match self {
            GroupStatus::Open => Ok(()),
            GroupStatus::Confirmed => Err(crate::error::DomainError::Conflict(
                "Group booking is full".to_string(),
            )),
            GroupStatus::Cancelled => Err(crate::error::DomainError::InvalidState(
                "Group booking is cancelled and not accepting participants".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared container limiting participants of one service occurrence
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupBooking {
    pub id: Uuid,
    pub service_id: Uuid,
    pub organizer_id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub max_participants: i32,
    pub min_participants: i32,
    /// Service price less the group discount
    pub price_per_person: Decimal,
    pub booking_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupRequest {
    pub service_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 2, message = "A group needs room for at least 2 participants"))]
    pub max_participants: i32,
    /// Defaults to the service's configured minimum
    #[validate(range(min = 1, message = "Minimum participants must be at least 1"))]
    pub min_participants: Option<i32>,
    pub booking_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Address must not exceed 500 characters"))]
    pub address: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct CancelGroupRequest {
    #[validate(length(max = 500, message = "Reason must not exceed 500 characters"))]
    pub reason: Option<String>,
}

/// Group metadata; the member list is only shown to participants and the provider
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: GroupBooking,
    pub participant_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Booking>>,
}

/// Member bookings still taking part in the group
pub fn active_members(bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.into_iter().filter(|b| !b.status.is_withdrawn()).collect()
}
