use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::{AddOn, Bundle, GroupSettings, Service, UserContact};
use crate::error::DomainResult;

/// Read access to the service catalog and user contact data
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_service(&self, id: Uuid) -> DomainResult<Option<Service>>;

    async fn find_group_settings(&self, service_id: Uuid) -> DomainResult<Option<GroupSettings>>;

    /// Returns the bundle only when `service_id` is one of its members
    async fn find_bundle_for_service(&self, bundle_id: Uuid, service_id: Uuid) -> DomainResult<Option<Bundle>>;

    /// Returns the add-ons among `ids` that belong to `service_id`
    async fn find_add_ons(&self, service_id: Uuid, ids: &[Uuid]) -> DomainResult<Vec<AddOn>>;

    async fn find_contact(&self, user_id: Uuid) -> DomainResult<Option<UserContact>>;

    async fn update_service_rating(&self, service_id: Uuid, average: Option<f64>, count: i32) -> DomainResult<()>;
}

const SERVICE_COLUMNS: &str = "id, provider_id, name, price, price_type, status, duration_minutes, \
     max_bookings, buffer_time, booking_count, rating_average, review_count, created_at";

/// Catalog repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_service(&self, id: Uuid) -> DomainResult<Option<Service>> {
        let service = sqlx::query_as::<_, Service>(&format!(
            "SELECT {} FROM services WHERE id = $1",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    async fn find_group_settings(&self, service_id: Uuid) -> DomainResult<Option<GroupSettings>> {
        let settings = sqlx::query_as::<_, GroupSettings>(
            r#"
            SELECT service_id, enabled, max_participants, min_participants, group_discount
            FROM group_settings
            WHERE service_id = $1
            "#,
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn find_bundle_for_service(&self, bundle_id: Uuid, service_id: Uuid) -> DomainResult<Option<Bundle>> {
        let bundle = sqlx::query_as::<_, Bundle>(
            r#"
            SELECT b.id, b.provider_id, b.name, b.discount_percent, b.active
            FROM bundles b
            JOIN bundle_services bs ON bs.bundle_id = b.id
            WHERE b.id = $1 AND bs.service_id = $2
            "#,
        )
        .bind(bundle_id)
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bundle)
    }

    async fn find_add_ons(&self, service_id: Uuid, ids: &[Uuid]) -> DomainResult<Vec<AddOn>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let add_ons = sqlx::query_as::<_, AddOn>(
            r#"
            SELECT id, service_id, name, price, active
            FROM add_ons
            WHERE service_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(service_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(add_ons)
    }

    async fn find_contact(&self, user_id: Uuid) -> DomainResult<Option<UserContact>> {
        let contact = sqlx::query_as::<_, UserContact>(
            r#"
            SELECT id, name, email, phone, email_enabled, sms_enabled, push_enabled
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    async fn update_service_rating(&self, service_id: Uuid, average: Option<f64>, count: i32) -> DomainResult<()> {
        sqlx::query("UPDATE services SET rating_average = $1, review_count = $2 WHERE id = $3")
            .bind(average)
            .bind(count)
            .bind(service_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
