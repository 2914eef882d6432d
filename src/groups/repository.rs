use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::groups::{GroupBooking, GroupStatus};

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn insert(&self, group: &GroupBooking) -> DomainResult<GroupBooking>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<GroupBooking>>;

    /// Move the group to `to` if its status is one of `expected`
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[GroupStatus],
        to: GroupStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<GroupBooking>>;

    /// Remove a group that never got its organizer booking
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
}

const GROUP_COLUMNS: &str = "id, service_id, organizer_id, provider_id, name, description, max_participants, \
     min_participants, price_per_person, booking_date, end_date, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn insert(&self, group: &GroupBooking) -> DomainResult<GroupBooking> {
        let inserted = sqlx::query_as::<_, GroupBooking>(&format!(
            r#"
            INSERT INTO group_bookings ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            GROUP_COLUMNS, GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(group.service_id)
        .bind(group.organizer_id)
        .bind(group.provider_id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.max_participants)
        .bind(group.min_participants)
        .bind(group.price_per_person)
        .bind(group.booking_date)
        .bind(group.end_date)
        .bind(group.status)
        .bind(group.created_at)
        .bind(group.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<GroupBooking>> {
        let group =
            sqlx::query_as::<_, GroupBooking>(&format!("SELECT {} FROM group_bookings WHERE id = $1", GROUP_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(group)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[GroupStatus],
        to: GroupStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<GroupBooking>> {
        let expected: Vec<&str> = expected.iter().map(|s| s.as_str()).collect();

        let group = sqlx::query_as::<_, GroupBooking>(&format!(
            r#"
            UPDATE group_bookings
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = ANY($4)
            RETURNING {}
            "#,
            GROUP_COLUMNS
        ))
        .bind(to)
        .bind(at)
        .bind(id)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM group_bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
