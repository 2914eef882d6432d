// Identification of the acting user
//
// Authentication happens upstream; the gateway forwards the authenticated
// user id in the `x-user-id` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::DomainError;

pub const ACTOR_HEADER: &str = "x-user-id";

/// Acting user extractor for every marketplace route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = DomainError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| DomainError::Unauthenticated(format!("missing {} header", ACTOR_HEADER)))?
            .to_str()
            .map_err(|_| DomainError::Unauthenticated(format!("{} header is not valid text", ACTOR_HEADER)))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| DomainError::Unauthenticated(format!("{} header is not a valid id", ACTOR_HEADER)))?;

        tracing::trace!(%user_id, "request actor resolved");
        Ok(Actor { user_id })
    }
}
