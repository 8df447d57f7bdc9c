//! Caller identity at the API boundary
//!
//! Authentication itself is an external collaborator. The gateway in
//! front of this service verifies credentials and forwards the caller's
//! id in the `x-user-id` header; requests without it are rejected.

use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use peoplesroom_core::core_room::UserId;

/// Header carrying the verified caller id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| CallerIdentity(UserId::new(s)))
            .ok_or(ApiError::Unauthorized)
    }
}
