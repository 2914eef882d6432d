// HTTP handlers for group booking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::actor::Actor;
use crate::app::AppState;
use crate::error::DomainError;
use crate::groups::{CancelGroupRequest, CreateGroupRequest, GroupDetails};

/// Handler for POST /api/groups
pub async fn create_group_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupDetails>), DomainError> {
    let details = state.groups.create(actor.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Handler for GET /api/groups/:id
pub async fn get_group_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupDetails>, DomainError> {
    let details = state.groups.get(actor.user_id, group_id).await?;
    Ok(Json(details))
}

/// Handler for POST /api/groups/:id/join
pub async fn join_group_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupDetails>, DomainError> {
    let details = state.groups.join(actor.user_id, group_id).await?;
    Ok(Json(details))
}

/// Handler for POST /api/groups/:id/leave
pub async fn leave_group_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupDetails>, DomainError> {
    let details = state.groups.leave(actor.user_id, group_id).await?;
    Ok(Json(details))
}

/// Handler for POST /api/groups/:id/cancel
pub async fn cancel_group_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CancelGroupRequest>,
) -> Result<Json<GroupDetails>, DomainError> {
    let details = state.groups.cancel(actor.user_id, group_id, request).await?;
    Ok(Json(details))
}
