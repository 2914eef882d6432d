// HTTP handlers for the in-app inbox

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::actor::Actor;
use crate::app::AppState;
use crate::error::DomainError;
use crate::notifications::{InAppNotification, InboxQuery};

/// List the caller's notifications, newest first
/// GET /api/notifications?unread_only=true
pub async fn list_notifications_handler(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<InAppNotification>>, DomainError> {
    let inbox = state.dispatcher.inbox(actor.user_id, query.unread_only).await?;
    Ok(Json(inbox))
}

/// POST /api/notifications/:id/read
pub async fn mark_notification_read_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<InAppNotification>, DomainError> {
    let notification = state.dispatcher.mark_read(actor.user_id, id).await?;
    Ok(Json(notification))
}
