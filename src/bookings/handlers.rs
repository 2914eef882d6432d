// HTTP handlers for booking endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::actor::Actor;
use crate::app::AppState;
use crate::bookings::{
    Booking, BookingDetails, BookingListQuery, CreateBookingRequest, DeclineBookingRequest, UpdateStatusRequest,
};
use crate::error::DomainError;

/// Handler for POST /api/bookings
pub async fn create_booking_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetails>), DomainError> {
    let details = state.bookings.create_booking(actor.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Handler for GET /api/bookings
/// Lists the caller's bookings, optionally filtered by role and status
pub async fn list_bookings_handler(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Vec<Booking>>, DomainError> {
    let bookings = state.bookings.list_bookings(actor.user_id, query).await?;
    Ok(Json(bookings))
}

/// Handler for GET /api/bookings/:id
pub async fn get_booking_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingDetails>, DomainError> {
    let details = state.bookings.get_booking(actor.user_id, booking_id).await?;
    Ok(Json(details))
}

/// Handler for POST /api/bookings/:id/accept
pub async fn accept_booking_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, DomainError> {
    let booking = state.bookings.accept_booking(actor.user_id, booking_id).await?;
    Ok(Json(booking))
}

/// Handler for POST /api/bookings/:id/decline
pub async fn decline_booking_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<DeclineBookingRequest>,
) -> Result<Json<Booking>, DomainError> {
    validator::Validate::validate(&request)?;
    let booking = state
        .bookings
        .decline_booking(actor.user_id, booking_id, request.reason)
        .await?;
    Ok(Json(booking))
}

/// Handler for PATCH /api/bookings/:id/status
/// Completes or cancels a booking (and accepts/declines for symmetry)
pub async fn update_booking_status_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, DomainError> {
    let booking = state.bookings.update_status(actor.user_id, booking_id, request).await?;
    Ok(Json(booking))
}
