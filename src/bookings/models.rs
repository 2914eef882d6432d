use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::Payment;

/// Booking status enum representing the lifecycle of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Declined => "declined",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Declined, completed and cancelled bookings never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Declined | BookingStatus::Completed | BookingStatus::Cancelled
        )
    }

    /// Statuses that occupy capacity (per-day caps, group seats)
    pub fn holds_capacity(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }

    /// Declined or cancelled: the booking no longer counts as a participation
    pub fn is_withdrawn(&self) -> bool {
        matches!(self, BookingStatus::Declined | BookingStatus::Cancelled)
    }
}

/// Side of a booking a user is looking from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Client,
    Provider,
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "accepted" => Ok(BookingStatus::Accepted),
            "declined" => Ok(BookingStatus::Declined),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }
}

/// Domain model representing a booking in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub service_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub booking_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recurring_booking_id: Option<Uuid>,
    pub group_booking_id: Option<Uuid>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether `user_id` is the client or the provider of this booking
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.provider_id == user_id
    }

    /// Calendar day (UTC) the booking starts on
    pub fn day(&self) -> NaiveDate {
        self.booking_date.date_naive()
    }

    /// End of the booked slot, falling back to a nominal duration
    pub fn slot_end(&self, fallback_minutes: i64) -> DateTime<Utc> {
        self.end_date
            .unwrap_or_else(|| self.booking_date + Duration::minutes(fallback_minutes.max(1)))
    }
}

/// Request DTO for creating a new booking
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub service_id: Uuid,
    pub booking_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(max = 2000, message = "Notes must not exceed 2000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Address must not exceed 500 characters"))]
    pub address: Option<String>,
    pub bundle_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 add-ons per booking"))]
    pub add_on_ids: Vec<Uuid>,
}

impl CreateBookingRequest {
    pub fn new(service_id: Uuid, booking_date: DateTime<Utc>) -> Self {
        Self {
            service_id,
            booking_date,
            end_date: None,
            notes: None,
            address: None,
            bundle_id: None,
            add_on_ids: Vec::new(),
        }
    }
}

/// Request DTO for declining a pending booking
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct DeclineBookingRequest {
    #[validate(length(max = 500, message = "Reason must not exceed 500 characters"))]
    pub reason: Option<String>,
}

/// Request DTO for updating booking status
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
    #[validate(length(max = 500, message = "Reason must not exceed 500 characters"))]
    pub reason: Option<String>,
}

/// Query parameters for listing a user's bookings
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookingListQuery {
    pub role: Option<PartyRole>,
    pub status: Option<BookingStatus>,
}

/// Booking together with its payment record
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub payment: Option<Payment>,
}

/// Links a booking created on behalf of another component
#[derive(Debug, Clone, Default)]
pub struct BookingOrigin {
    pub recurring_booking_id: Option<Uuid>,
    pub group_booking_id: Option<Uuid>,
    /// Seat limit enforced atomically with the insert
    pub group_max_participants: Option<i32>,
    /// Replaces the duration/bundle price (add-ons still apply)
    pub price_override: Option<Decimal>,
}

impl BookingOrigin {
    pub fn recurring(series_id: Uuid) -> Self {
        Self {
            recurring_booking_id: Some(series_id),
            ..Self::default()
        }
    }

    pub fn group(group_id: Uuid, max_participants: i32, price_per_person: Decimal) -> Self {
        Self {
            group_booking_id: Some(group_id),
            group_max_participants: Some(max_participants),
            price_override: Some(price_per_person),
            ..Self::default()
        }
    }
}

/// Row to insert for a new booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: Uuid,
    pub service_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub booking_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_price: Decimal,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub recurring_booking_id: Option<Uuid>,
    pub group_booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    /// Materialize the inserted row (status pending)
    pub fn into_booking(self) -> Booking {
        Booking {
            id: self.id,
            service_id: self.service_id,
            client_id: self.client_id,
            provider_id: self.provider_id,
            booking_date: self.booking_date,
            end_date: self.end_date,
            total_price: self.total_price,
            status: BookingStatus::Pending,
            notes: self.notes,
            address: self.address,
            cancellation_reason: None,
            cancelled_by: None,
            completed_at: None,
            is_recurring: self.recurring_booking_id.is_some(),
            recurring_booking_id: self.recurring_booking_id,
            group_booking_id: self.group_booking_id,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}
