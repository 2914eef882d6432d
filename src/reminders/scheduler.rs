use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::bookings::{Booking, BookingRepository};
use crate::catalog::CatalogRepository;
use crate::clock::Clock;
use crate::error::DomainResult;
use crate::notifications::{Notification, NotificationDispatcher};
use crate::reminders::{
    BookingReminder, DispatchReport, ReminderRepository, ReminderType, MAX_REMINDER_RETRIES,
};

/// Reminders handled per dispatch or retry pass
const DISPATCH_BATCH: i64 = 100;

/// Schedules booking reminders and drives their delivery
#[derive(Clone)]
pub struct ReminderScheduler {
    reminders: Arc<dyn ReminderRepository>,
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

/// Fire times still ahead of `now` for a booking starting at `booking_date`
pub fn candidate_times(booking_date: DateTime<Utc>, now: DateTime<Utc>) -> Vec<(ReminderType, DateTime<Utc>)> {
    ReminderType::ALL
        .iter()
        .map(|kind| (*kind, kind.fire_time(booking_date)))
        .filter(|(_, at)| *at > now)
        .collect()
}

impl ReminderScheduler {
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reminders,
            bookings,
            catalog,
            dispatcher,
            clock,
        }
    }

    /// Persist the reminders of `booking` that are still in the future
    ///
    /// Returns how many new rows were written; duplicates are skipped.
    pub async fn schedule_for_booking(&self, booking: &Booking) -> DomainResult<usize> {
        let now = self.clock.now();
        let mut scheduled = 0;

        for (kind, fire_at) in candidate_times(booking.booking_date, now) {
            let reminder = BookingReminder::pending(booking.id, kind, fire_at, now);
            if self.reminders.insert_if_absent(&reminder).await? {
                scheduled += 1;
            }
        }

        tracing::debug!(booking_id = %booking.id, scheduled, "reminders scheduled");
        Ok(scheduled)
    }

    pub async fn cancel_for_booking(&self, booking_id: Uuid) -> DomainResult<u64> {
        let cancelled = self.reminders.cancel_pending(booking_id).await?;
        if cancelled > 0 {
            tracing::debug!(%booking_id, cancelled, "pending reminders cancelled");
        }
        Ok(cancelled)
    }

    pub async fn find_for_booking(&self, booking_id: Uuid) -> DomainResult<Vec<BookingReminder>> {
        self.reminders.find_for_booking(booking_id).await
    }

    /// Send every pending reminder that is due
    pub async fn dispatch_due(&self) -> DomainResult<DispatchReport> {
        let due = self.reminders.find_due(self.clock.now(), DISPATCH_BATCH).await?;
        let report = self.attempt_all(due).await;
        if report != DispatchReport::default() {
            tracing::info!(?report, "reminder dispatch finished");
        }
        Ok(report)
    }

    /// Re-attempt failed reminders of bookings that have not started yet
    pub async fn retry_failed(&self) -> DomainResult<DispatchReport> {
        let retryable = self
            .reminders
            .find_retryable(self.clock.now(), MAX_REMINDER_RETRIES, DISPATCH_BATCH)
            .await?;
        let report = self.attempt_all(retryable).await;
        if report != DispatchReport::default() {
            tracing::info!(?report, "reminder retry finished");
        }
        Ok(report)
    }

    async fn attempt_all(&self, reminders: Vec<BookingReminder>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for reminder in reminders {
            if let Err(e) = self.attempt(&reminder, &mut report).await {
                tracing::error!(reminder_id = %reminder.id, error = %e, "reminder could not be processed");
            }
        }
        report
    }

    async fn attempt(&self, reminder: &BookingReminder, report: &mut DispatchReport) -> DomainResult<()> {
        let booking = match self.bookings.find_by_id(reminder.booking_id).await? {
            Some(booking) if booking.status.holds_capacity() => booking,
            _ => {
                self.reminders.cancel_pending(reminder.booking_id).await?;
                report.cancelled += 1;
                return Ok(());
            }
        };

        let service_name = self
            .catalog
            .find_service(booking.service_id)
            .await?
            .map(|service| service.name)
            .unwrap_or_else(|| "your booking".to_string());

        let kind = reminder.reminder_type;
        let notification = Notification::booking_reminder(&booking, &service_name, kind.hours_before());

        match self.dispatcher.deliver(booking.client_id, &notification, kind.channel()).await {
            Ok(()) => {
                self.reminders.mark_sent(reminder.id, self.clock.now()).await?;
                report.sent += 1;
            }
            Err(e) => {
                tracing::warn!(reminder_id = %reminder.id, error = %e, "reminder delivery failed");
                self.reminders.mark_failed(reminder.id, &e.to_string()).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_all_candidates_when_far_out() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let start = now + Duration::days(3);
        let candidates = candidate_times(start, now);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.contains(&(ReminderType::Email24h, start - Duration::hours(24))));
        assert!(candidates.contains(&(ReminderType::Push2h, start - Duration::hours(2))));
    }

    #[test]
    fn test_past_candidates_are_skipped() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let start = now + Duration::hours(5);
        let candidates = candidate_times(start, now);
        assert_eq!(candidates, vec![(ReminderType::Push2h, start - Duration::hours(2))]);
    }

    #[test]
    fn test_nothing_for_imminent_booking() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        assert!(candidate_times(now + Duration::minutes(90), now).is_empty());
    }
}
