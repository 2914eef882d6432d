use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::reminders::BookingReminder;

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Insert unless a reminder with the same booking, type and fire time
    /// exists; returns whether a row was written
    async fn insert_if_absent(&self, reminder: &BookingReminder) -> DomainResult<bool>;

    /// Pending reminders with `scheduled_for <= now`, oldest first
    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> DomainResult<Vec<BookingReminder>>;

    /// Failed reminders under the retry bound whose booking is still active
    /// and starts after `now`
    async fn find_retryable(&self, now: DateTime<Utc>, max_retries: i32, limit: i64)
        -> DomainResult<Vec<BookingReminder>>;

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    /// Set failed, store the error and bump the retry counter
    async fn mark_failed(&self, id: Uuid, error: &str) -> DomainResult<()>;

    /// Pending reminders of a booking become cancelled; sent ones are untouched
    async fn cancel_pending(&self, booking_id: Uuid) -> DomainResult<u64>;

    async fn find_for_booking(&self, booking_id: Uuid) -> DomainResult<Vec<BookingReminder>>;
}

const REMINDER_COLUMNS: &str =
    "id, booking_id, reminder_type, scheduled_for, status, sent_at, retry_count, last_error, created_at";

#[derive(Clone)]
pub struct PgReminderRepository {
    pool: PgPool,
}

impl PgReminderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderRepository for PgReminderRepository {
    async fn insert_if_absent(&self, reminder: &BookingReminder) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO booking_reminders (id, booking_id, reminder_type, scheduled_for, status,
                                           sent_at, retry_count, last_error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (booking_id, reminder_type, scheduled_for) DO NOTHING
            "#,
        )
        .bind(reminder.id)
        .bind(reminder.booking_id)
        .bind(reminder.reminder_type)
        .bind(reminder.scheduled_for)
        .bind(reminder.status)
        .bind(reminder.sent_at)
        .bind(reminder.retry_count)
        .bind(&reminder.last_error)
        .bind(reminder.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> DomainResult<Vec<BookingReminder>> {
        let reminders = sqlx::query_as::<_, BookingReminder>(&format!(
            r#"
            SELECT {}
            FROM booking_reminders
            WHERE status = 'pending' AND scheduled_for <= $1
            ORDER BY scheduled_for
            LIMIT $2
            "#,
            REMINDER_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    async fn find_retryable(
        &self,
        now: DateTime<Utc>,
        max_retries: i32,
        limit: i64,
    ) -> DomainResult<Vec<BookingReminder>> {
        let reminders = sqlx::query_as::<_, BookingReminder>(
            r#"
            SELECT r.id, r.booking_id, r.reminder_type, r.scheduled_for, r.status, r.sent_at,
                   r.retry_count, r.last_error, r.created_at
            FROM booking_reminders r
            JOIN bookings b ON b.id = r.booking_id
            WHERE r.status = 'failed' AND r.retry_count < $1 AND b.booking_date > $2
              AND b.status IN ('pending', 'accepted')
            ORDER BY r.scheduled_for
            LIMIT $3
            "#,
        )
        .bind(max_retries)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query("UPDATE booking_reminders SET status = 'sent', sent_at = $1, last_error = NULL WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> DomainResult<()> {
        sqlx::query(
            r#"
            UPDATE booking_reminders
            SET status = 'failed', last_error = $1, retry_count = retry_count + 1
            WHERE id = $2
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cancel_pending(&self, booking_id: Uuid) -> DomainResult<u64> {
        let result = sqlx::query(
            "UPDATE booking_reminders SET status = 'cancelled' WHERE booking_id = $1 AND status = 'pending'",
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_for_booking(&self, booking_id: Uuid) -> DomainResult<Vec<BookingReminder>> {
        let reminders = sqlx::query_as::<_, BookingReminder>(&format!(
            "SELECT {} FROM booking_reminders WHERE booking_id = $1 ORDER BY scheduled_for",
            REMINDER_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }
}
