use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::waitlist::{WaitlistEntry, WaitlistJoin};

#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<WaitlistEntry>>;

    /// The client's entry for the service, whatever its status
    async fn find_for_client_service(&self, service_id: Uuid, client_id: Uuid) -> DomainResult<Option<WaitlistEntry>>;

    /// Fails with `Conflict` if the client already has a live entry
    async fn insert(&self, entry: &WaitlistEntry) -> DomainResult<WaitlistEntry>;

    /// Reuse a booked or cancelled entry as a fresh active one
    async fn rejoin(&self, id: Uuid, join: &WaitlistJoin) -> DomainResult<Option<WaitlistEntry>>;

    /// Active entries wanting `day`, by priority desc then creation asc
    async fn find_matching(&self, service_id: Uuid, day: NaiveDate, limit: i64) -> DomainResult<Vec<WaitlistEntry>>;

    /// active -> notified
    async fn mark_notified(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<Option<WaitlistEntry>>;

    /// notified -> booked, only while the offer is still open at `now`
    async fn claim_for_booking(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<WaitlistEntry>>;

    /// booked -> notified, undoing a claim whose booking could not be created
    async fn restore_notified(&self, id: Uuid) -> DomainResult<()>;

    /// active | notified -> cancelled
    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<Option<WaitlistEntry>>;

    /// Expired notified entries go back to active; returns how many
    async fn revert_expired(&self, now: DateTime<Utc>) -> DomainResult<u64>;

    async fn find_for_client(&self, client_id: Uuid) -> DomainResult<Vec<WaitlistEntry>>;

    async fn find_active_for_service(&self, service_id: Uuid) -> DomainResult<Vec<WaitlistEntry>>;
}

const ENTRY_COLUMNS: &str = "id, service_id, client_id, provider_id, preferred_date, preferred_time, \
     alternative_dates, priority, status, notes, notified_at, expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgWaitlistRepository {
    pool: PgPool,
}

impl PgWaitlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitlistRepository for PgWaitlistRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<WaitlistEntry>> {
        let entry =
            sqlx::query_as::<_, WaitlistEntry>(&format!("SELECT {} FROM waitlist_entries WHERE id = $1", ENTRY_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(entry)
    }

    async fn find_for_client_service(&self, service_id: Uuid, client_id: Uuid) -> DomainResult<Option<WaitlistEntry>> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            SELECT {}
            FROM waitlist_entries
            WHERE service_id = $1 AND client_id = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
            ENTRY_COLUMNS
        ))
        .bind(service_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn insert(&self, entry: &WaitlistEntry) -> DomainResult<WaitlistEntry> {
        let inserted = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            INSERT INTO waitlist_entries (id, service_id, client_id, provider_id, preferred_date,
                                          preferred_time, alternative_dates, priority, status, notes,
                                          created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(entry.id)
        .bind(entry.service_id)
        .bind(entry.client_id)
        .bind(entry.provider_id)
        .bind(entry.preferred_date)
        .bind(entry.preferred_time)
        .bind(&entry.alternative_dates)
        .bind(entry.priority)
        .bind(entry.status)
        .bind(&entry.notes)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DomainError::Conflict("Already on the waitlist for this service".to_string())
            }
            other => DomainError::Database(other),
        })?;

        Ok(inserted)
    }

    async fn rejoin(&self, id: Uuid, join: &WaitlistJoin) -> DomainResult<Option<WaitlistEntry>> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            UPDATE waitlist_entries
            SET status = 'active', preferred_date = $1, preferred_time = $2, alternative_dates = $3,
                priority = $4, notes = $5, notified_at = NULL, expires_at = NULL, updated_at = $6
            WHERE id = $7 AND status IN ('booked', 'cancelled')
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(join.preferred_date)
        .bind(join.preferred_time)
        .bind(&join.alternative_dates)
        .bind(join.priority)
        .bind(&join.notes)
        .bind(join.at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn find_matching(&self, service_id: Uuid, day: NaiveDate, limit: i64) -> DomainResult<Vec<WaitlistEntry>> {
        let entries = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            SELECT {}
            FROM waitlist_entries
            WHERE service_id = $1
              AND status = 'active'
              AND (preferred_date = $2 OR $2 = ANY(alternative_dates))
            ORDER BY priority DESC, created_at ASC
            LIMIT $3
            "#,
            ENTRY_COLUMNS
        ))
        .bind(service_id)
        .bind(day)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn mark_notified(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<Option<WaitlistEntry>> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            UPDATE waitlist_entries
            SET status = 'notified', notified_at = $1, expires_at = $2, updated_at = $1
            WHERE id = $3 AND status = 'active'
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(at)
        .bind(expires_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn claim_for_booking(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<WaitlistEntry>> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            UPDATE waitlist_entries
            SET status = 'booked', updated_at = $1
            WHERE id = $2 AND status = 'notified' AND expires_at > $1
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn restore_notified(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE waitlist_entries SET status = 'notified' WHERE id = $1 AND status = 'booked'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<Option<WaitlistEntry>> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            UPDATE waitlist_entries
            SET status = 'cancelled', updated_at = $1
            WHERE id = $2 AND status IN ('active', 'notified')
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn revert_expired(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE waitlist_entries
            SET status = 'active', notified_at = NULL, expires_at = NULL, updated_at = $1
            WHERE status = 'notified' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_for_client(&self, client_id: Uuid) -> DomainResult<Vec<WaitlistEntry>> {
        let entries = sqlx::query_as::<_, WaitlistEntry>(&format!(
            "SELECT {} FROM waitlist_entries WHERE client_id = $1 ORDER BY created_at DESC",
            ENTRY_COLUMNS
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find_active_for_service(&self, service_id: Uuid) -> DomainResult<Vec<WaitlistEntry>> {
        let entries = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            SELECT {}
            FROM waitlist_entries
            WHERE service_id = $1 AND status IN ('active', 'notified')
            ORDER BY priority DESC, created_at ASC
            "#,
            ENTRY_COLUMNS
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
