use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::bookings::Booking;
use crate::error::DomainError;

/// Which side of a booked slot a blocked window pads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    BufferBefore,
    BufferAfter,
}

/// A blocked window recorded next to a booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimeSlot {
    pub id: Uuid,
    pub service_id: Uuid,
    pub provider_id: Uuid,
    pub booking_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub kind: SlotKind,
    pub created_at: DateTime<Utc>,
}

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The whole UTC calendar day
    pub fn day(day: NaiveDate) -> Self {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        Self::new(start, start + Duration::days(1))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Strict overlap: windows that only touch do not overlap
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Per-day caps and buffer-time blocking
pub struct CapacityGuard;

impl CapacityGuard {
    /// Reject when `active_on_day` pending + accepted bookings already fill the cap
    pub fn check_daily_limit(max_bookings: Option<i32>, active_on_day: i64) -> Result<(), DomainError> {
        match max_bookings {
            Some(max) if active_on_day >= i64::from(max) => Err(DomainError::Conflict(format!(
                "Service is fully booked for this day ({} of {} slots taken)",
                active_on_day, max
            ))),
            _ => Ok(()),
        }
    }

    /// Windows blocked around `slot`: `[start - buffer, start)` and `[end, end + buffer)`
    pub fn buffer_windows(slot: Window, buffer_minutes: i64) -> Option<(Window, Window)> {
        if buffer_minutes <= 0 {
            return None;
        }
        let buffer = Duration::minutes(buffer_minutes);
        Some((
            Window::new(slot.start - buffer, slot.start),
            Window::new(slot.end, slot.end + buffer),
        ))
    }

    /// Whether `slot` falls inside any blocked window
    pub fn overlaps_any(slot: Window, blocked: &[TimeSlot]) -> bool {
        blocked
            .iter()
            .any(|existing| slot.overlaps(&Window::new(existing.start_time, existing.end_time)))
    }

    /// Time-slot rows blocking the buffers of `booking`
    pub fn buffer_slots(
        booking: &Booking,
        buffer_minutes: i64,
        fallback_minutes: i64,
        now: DateTime<Utc>,
    ) -> Vec<TimeSlot> {
        let slot = Window::new(booking.booking_date, booking.slot_end(fallback_minutes));
        let Some((before, after)) = Self::buffer_windows(slot, buffer_minutes) else {
            return Vec::new();
        };

        [(before, SlotKind::BufferBefore), (after, SlotKind::BufferAfter)]
            .into_iter()
            .map(|(window, kind)| TimeSlot {
                id: Uuid::new_v4(),
                service_id: booking.service_id,
                provider_id: booking.provider_id,
                booking_id: booking.id,
                start_time: window.start,
                end_time: window.end,
                kind,
                created_at: now,
            })
            .collect()
    }
}
