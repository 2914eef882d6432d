// HTTP handlers for waitlist endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::actor::Actor;
use crate::app::AppState;
use crate::error::DomainError;
use crate::waitlist::{
    ConvertWaitlistRequest, JoinWaitlistRequest, NotifyWaitlistRequest, WaitlistConversion, WaitlistEntry,
};

/// Handler for POST /api/waitlist
pub async fn join_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<JoinWaitlistRequest>,
) -> Result<(StatusCode, Json<WaitlistEntry>), DomainError> {
    let entry = state.waitlist.join(actor.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Handler for GET /api/waitlist
pub async fn list_my_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<WaitlistEntry>>, DomainError> {
    let entries = state.waitlist.list_mine(actor.user_id).await?;
    Ok(Json(entries))
}

/// Handler for GET /api/services/:id/waitlist
pub async fn list_service_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Vec<WaitlistEntry>>, DomainError> {
    let entries = state.waitlist.list_for_service(actor.user_id, service_id).await?;
    Ok(Json(entries))
}

/// Handler for DELETE /api/waitlist/:id
pub async fn leave_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<WaitlistEntry>, DomainError> {
    let entry = state.waitlist.leave(actor.user_id, entry_id).await?;
    Ok(Json(entry))
}

/// Handler for POST /api/waitlist/:id/notify
pub async fn notify_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<NotifyWaitlistRequest>,
) -> Result<Json<WaitlistEntry>, DomainError> {
    let entry = state.waitlist.notify(actor.user_id, entry_id, request).await?;
    Ok(Json(entry))
}

/// Handler for POST /api/waitlist/:id/convert
pub async fn convert_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<ConvertWaitlistRequest>,
) -> Result<(StatusCode, Json<WaitlistConversion>), DomainError> {
    let conversion = state.waitlist.convert(actor.user_id, entry_id, request).await?;
    Ok((StatusCode::CREATED, Json(conversion)))
}
