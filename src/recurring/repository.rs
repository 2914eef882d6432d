use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::recurring::{RecurringBooking, RecurringStatus};

#[async_trait]
pub trait RecurringRepository: Send + Sync {
    async fn insert(&self, series: &RecurringBooking) -> DomainResult<RecurringBooking>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<RecurringBooking>>;

    /// Series where the user is the client or the provider
    async fn find_for_user(&self, user_id: Uuid) -> DomainResult<Vec<RecurringBooking>>;

    async fn find_active(&self) -> DomainResult<Vec<RecurringBooking>>;

    /// Move the series to `to` if its status is one of `expected`
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[RecurringStatus],
        to: RecurringStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<RecurringBooking>>;
}

// "interval" is a keyword in PostgreSQL
const SERIES_COLUMNS: &str = "id, service_id, client_id, provider_id, frequency, \"interval\", start_date, end_date, \
     occurrences, days_of_week, day_of_month, time_of_day, duration_minutes, status, notes, address, \
     created_at, updated_at";

#[derive(Clone)]
pub struct PgRecurringRepository {
    pool: PgPool,
}

impl PgRecurringRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecurringRepository for PgRecurringRepository {
    async fn insert(&self, series: &RecurringBooking) -> DomainResult<RecurringBooking> {
        let inserted = sqlx::query_as::<_, RecurringBooking>(&format!(
            r#"
            INSERT INTO recurring_bookings ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {}
            "#,
            SERIES_COLUMNS, SERIES_COLUMNS
        ))
        .bind(series.id)
        .bind(series.service_id)
        .bind(series.client_id)
        .bind(series.provider_id)
        .bind(series.frequency)
        .bind(series.interval)
        .bind(series.start_date)
        .bind(series.end_date)
        .bind(series.occurrences)
        .bind(&series.days_of_week)
        .bind(series.day_of_month)
        .bind(series.time_of_day)
        .bind(series.duration_minutes)
        .bind(series.status)
        .bind(&series.notes)
        .bind(&series.address)
        .bind(series.created_at)
        .bind(series.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<RecurringBooking>> {
        let series = sqlx::query_as::<_, RecurringBooking>(&format!(
            "SELECT {} FROM recurring_bookings WHERE id = $1",
            SERIES_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(series)
    }

    async fn find_for_user(&self, user_id: Uuid) -> DomainResult<Vec<RecurringBooking>> {
        let series = sqlx::query_as::<_, RecurringBooking>(&format!(
            r#"
            SELECT {}
            FROM recurring_bookings
            WHERE client_id = $1 OR provider_id = $1
            ORDER BY created_at DESC
            "#,
            SERIES_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(series)
    }

    async fn find_active(&self) -> DomainResult<Vec<RecurringBooking>> {
        let series = sqlx::query_as::<_, RecurringBooking>(&format!(
            "SELECT {} FROM recurring_bookings WHERE status = 'active' ORDER BY created_at",
            SERIES_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(series)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[RecurringStatus],
        to: RecurringStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<RecurringBooking>> {
        let expected: Vec<&str> = expected.iter().map(|s| s.as_str()).collect();

        let series = sqlx::query_as::<_, RecurringBooking>(&format!(
            r#"
            UPDATE recurring_bookings
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = ANY($4)
            RETURNING {}
            "#,
            SERIES_COLUMNS
        ))
        .bind(to)
        .bind(at)
        .bind(id)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        Ok(series)
    }
}
