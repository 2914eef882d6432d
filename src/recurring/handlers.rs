// HTTP handlers for recurring series endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::actor::Actor;
use crate::app::AppState;
use crate::error::DomainError;
use crate::recurring::{CreateRecurringRequest, RecurringBooking, RecurringSeriesDetails, ResumeRecurringRequest};

/// Handler for POST /api/recurring
pub async fn create_series_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateRecurringRequest>,
) -> Result<(StatusCode, Json<RecurringSeriesDetails>), DomainError> {
    let details = state.recurring.create_series(actor.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Handler for GET /api/recurring
pub async fn list_series_handler(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<RecurringBooking>>, DomainError> {
    let series = state.recurring.list_series(actor.user_id).await?;
    Ok(Json(series))
}

/// Handler for GET /api/recurring/:id
pub async fn get_series_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(series_id): Path<Uuid>,
) -> Result<Json<RecurringSeriesDetails>, DomainError> {
    let details = state.recurring.get_series(actor.user_id, series_id).await?;
    Ok(Json(details))
}

/// Handler for POST /api/recurring/:id/pause
pub async fn pause_series_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(series_id): Path<Uuid>,
) -> Result<Json<RecurringSeriesDetails>, DomainError> {
    let details = state.recurring.pause(actor.user_id, series_id).await?;
    Ok(Json(details))
}

/// Handler for POST /api/recurring/:id/resume
pub async fn resume_series_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(series_id): Path<Uuid>,
    Json(request): Json<ResumeRecurringRequest>,
) -> Result<Json<RecurringSeriesDetails>, DomainError> {
    let details = state
        .recurring
        .resume(actor.user_id, series_id, request.resume_date)
        .await?;
    Ok(Json(details))
}

/// Handler for POST /api/recurring/:id/cancel
pub async fn cancel_series_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(series_id): Path<Uuid>,
) -> Result<Json<RecurringSeriesDetails>, DomainError> {
    let details = state.recurring.cancel_series(actor.user_id, series_id).await?;
    Ok(Json(details))
}
