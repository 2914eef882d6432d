use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::reviews::Review;

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fails with `Conflict` when the booking was already reviewed
    async fn insert(&self, review: &Review) -> DomainResult<Review>;

    async fn find_by_booking(&self, booking_id: Uuid) -> DomainResult<Option<Review>>;

    /// Newest first
    async fn find_for_service(&self, service_id: Uuid) -> DomainResult<Vec<Review>>;

    async fn ratings_for_service(&self, service_id: Uuid) -> DomainResult<Vec<i16>>;
}

const REVIEW_COLUMNS: &str = "id, booking_id, service_id, client_id, rating, comment, created_at, updated_at";

/// Repository for database operations on reviews
#[derive(Clone)]
pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn insert(&self, review: &Review) -> DomainResult<Review> {
        let inserted = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            REVIEW_COLUMNS, REVIEW_COLUMNS
        ))
        .bind(review.id)
        .bind(review.booking_id)
        .bind(review.service_id)
        .bind(review.client_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DomainError::Conflict("This booking has already been reviewed".to_string())
            }
            other => DomainError::Database(other),
        })?;

        Ok(inserted)
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> DomainResult<Option<Review>> {
        let review =
            sqlx::query_as::<_, Review>(&format!("SELECT {} FROM reviews WHERE booking_id = $1", REVIEW_COLUMNS))
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(review)
    }

    async fn find_for_service(&self, service_id: Uuid) -> DomainResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {} FROM reviews WHERE service_id = $1 ORDER BY created_at DESC",
            REVIEW_COLUMNS
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn ratings_for_service(&self, service_id: Uuid) -> DomainResult<Vec<i16>> {
        let ratings: Vec<(i16,)> = sqlx::query_as("SELECT rating FROM reviews WHERE service_id = $1")
            .bind(service_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ratings.into_iter().map(|(rating,)| rating).collect())
    }
}
