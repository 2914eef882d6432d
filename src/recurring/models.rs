use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecurringStatus {
    Active,
    Paused,
    Cancelled,
    Completed,
}

impl RecurringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringStatus::Active => "active",
            RecurringStatus::Paused => "paused",
            RecurringStatus::Cancelled => "cancelled",
            RecurringStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RecurringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Template that materializes a bounded sequence of bookings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurringBooking {
    pub id: Uuid,
    pub service_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub frequency: Frequency,
    pub interval: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Upper bound of generated occurrences, counted from `start_date`
    pub occurrences: i32,
    /// 0 = Sunday .. 6 = Saturday
    pub days_of_week: Vec<i32>,
    pub day_of_month: Option<i32>,
    pub time_of_day: NaiveTime,
    pub duration_minutes: i32,
    pub status: RecurringStatus,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringBooking {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.provider_id == user_id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRecurringRequest {
    pub service_id: Uuid,
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    #[validate(range(min = 1, max = 12, message = "Interval must be between 1 and 12"))]
    pub interval: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub occurrences: Option<i32>,
    #[serde(default)]
    pub days_of_week: Vec<i32>,
    #[validate(range(min = 1, max = 31, message = "Day of month must be between 1 and 31"))]
    pub day_of_month: Option<i32>,
    pub time_of_day: NaiveTime,
    #[validate(range(min = 5, max = 1440, message = "Duration must be between 5 minutes and 24 hours"))]
    pub duration_minutes: i32,
    #[validate(length(max = 2000, message = "Notes must not exceed 2000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Address must not exceed 500 characters"))]
    pub address: Option<String>,
}

fn default_interval() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumeRecurringRequest {
    pub resume_date: NaiveDate,
}

/// A series with its materialized bookings
#[derive(Debug, Clone, Serialize)]
pub struct RecurringSeriesDetails {
    #[serde(flatten)]
    pub series: RecurringBooking,
    pub bookings: Vec<Booking>,
}

/// Outcome of one "generate upcoming" pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub series_scanned: usize,
    pub bookings_created: usize,
    pub series_completed: usize,
}
