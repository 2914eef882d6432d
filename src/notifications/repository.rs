use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DomainResult;
use crate::notifications::NotificationKind;

/// Row of a user's in-app inbox
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InAppNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for the inbox listing
#[derive(Debug, Default, Clone, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &InAppNotification) -> DomainResult<()>;

    /// Newest first
    async fn find_for_user(&self, user_id: Uuid, unread_only: bool) -> DomainResult<Vec<InAppNotification>>;

    /// Marks the row read if it belongs to `user_id`
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DomainResult<Option<InAppNotification>>;
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, data, read, created_at";

/// In-app notification storage backed by PostgreSQL
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, notification: &InAppNotification) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, body, data, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_for_user(&self, user_id: Uuid, unread_only: bool) -> DomainResult<Vec<InAppNotification>> {
        let notifications = sqlx::query_as::<_, InAppNotification>(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read = FALSE)
            ORDER BY created_at DESC
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DomainResult<Option<InAppNotification>> {
        let notification = sqlx::query_as::<_, InAppNotification>(&format!(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }
}
