/// Request extractors
///
/// Mutating task routes act on behalf of the user named in the `X-User-ID`
/// header. Authentication happens upstream; this service only checks
/// ownership.

use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Header carrying the acting user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a mutating request acts for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-ID header".to_string()))?;

        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(ActingUser)
            .ok_or_else(|| ApiError::BadRequest("X-User-ID must be a positive integer".to_string()))
    }
}
