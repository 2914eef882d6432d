use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Publication status of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Archived,
}

/// How a service's price is applied to a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Fixed,
    Hourly,
}

/// A bookable offering published by a provider
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub price_type: PriceType,
    pub status: ServiceStatus,
    /// Nominal length of one appointment, used when a booking has no end date
    pub duration_minutes: Option<i32>,
    /// Per-day cap of pending + accepted bookings; `None` means unlimited
    pub max_bookings: Option<i32>,
    /// Minutes blocked before and after every booked slot
    pub buffer_time: Option<i32>,
    pub booking_count: i32,
    pub rating_average: Option<f64>,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }

    pub fn buffer_minutes(&self) -> i64 {
        self.buffer_time.map(i64::from).unwrap_or(0).max(0)
    }
}

/// Group-booking configuration of a service
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupSettings {
    pub service_id: Uuid,
    pub enabled: bool,
    pub max_participants: i32,
    pub min_participants: i32,
    /// Percent taken off the service price for every participant
    pub group_discount: Decimal,
}

/// Provider-defined set of services sold together at a discount
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bundle {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub discount_percent: Decimal,
    pub active: bool,
}

/// Optional paid extra attached to a single booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AddOn {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub active: bool,
}

/// Contact details and channel preferences of a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserContact {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub push_enabled: bool,
}
