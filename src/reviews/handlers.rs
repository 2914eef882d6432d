// HTTP handlers for review endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::actor::Actor;
use crate::app::AppState;
use crate::error::DomainError;
use crate::reviews::{CreateReviewRequest, Review};

/// Create a new review
/// POST /api/reviews
pub async fn create_review_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), DomainError> {
    let review = state.reviews.create_review(actor.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Get all reviews for a service
/// GET /api/services/:id/reviews
pub async fn get_reviews_for_service_handler(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, DomainError> {
    let reviews = state.reviews.get_reviews_for_service(service_id).await?;
    Ok(Json(reviews))
}
