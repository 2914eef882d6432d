use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::notifications::Channel;

/// Failed reminders are retried at most this many times
pub const MAX_REMINDER_RETRIES: i32 = 3;

/// Kinds of reminder scheduled for every accepted booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Email24h,
    Sms24h,
    Push2h,
}

impl ReminderType {
    pub const ALL: [ReminderType; 3] = [ReminderType::Email24h, ReminderType::Sms24h, ReminderType::Push2h];

    pub fn channel(&self) -> Channel {
        match self {
            ReminderType::Email24h => Channel::Email,
            ReminderType::Sms24h => Channel::Sms,
            ReminderType::Push2h => Channel::Push,
        }
    }

    pub fn hours_before(&self) -> i64 {
        match self {
            ReminderType::Email24h | ReminderType::Sms24h => 24,
            ReminderType::Push2h => 2,
        }
    }

    /// Fire time for a booking starting at `booking_date`
    pub fn fire_time(&self, booking_date: DateTime<Utc>) -> DateTime<Utc> {
        booking_date - Duration::hours(self.hours_before())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

/// A scheduled notification tied to one booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingReminder {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
    pub status: ReminderStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingReminder {
    pub fn pending(booking_id: Uuid, reminder_type: ReminderType, scheduled_for: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            reminder_type,
            scheduled_for,
            status: ReminderStatus::Pending,
            sent_at: None,
            retry_count: 0,
            last_error: None,
            created_at: now,
        }
    }
}

/// Counts of one dispatch or retry pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Reminders of bookings that are no longer active
    pub cancelled: usize,
}
