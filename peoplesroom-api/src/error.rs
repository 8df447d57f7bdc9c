use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use peoplesroom_core::core_knock::KnockError;
use peoplesroom_core::core_presence::SessionError;
use peoplesroom_core::core_room::{ForbiddenReason, RoomError, ServiceError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid caller identity")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Machine-readable reason tag for response bodies
fn forbidden_tag(reason: &ForbiddenReason) -> &'static str {
    match reason {
        ForbiddenReason::NotVisible => "NOT_VISIBLE",
        ForbiddenReason::DoorLocked => "DOOR_LOCKED",
        ForbiddenReason::DoorDnd => "DOOR_DND",
        ForbiddenReason::OwnerAway => "OWNER_AWAY",
        ForbiddenReason::KnockNotPermitted => "KNOCK_NOT_PERMITTED",
        ForbiddenReason::EntryNotPermitted => "ENTRY_NOT_PERMITTED",
    }
}

fn map_service(err: &ServiceError) -> (StatusCode, &'static str) {
    match err {
        ServiceError::Forbidden(reason) => (StatusCode::FORBIDDEN, forbidden_tag(reason)),
        ServiceError::RoomNotFound(_) => (StatusCode::NOT_FOUND, "ROOM_NOT_FOUND"),
        ServiceError::Knock(e) => match e {
            KnockError::AlreadyPending => (StatusCode::CONFLICT, "KNOCK_ALREADY_PENDING"),
            KnockError::MessageTooLong(_) => (StatusCode::BAD_REQUEST, "MESSAGE_TOO_LONG"),
            KnockError::NotFound => (StatusCode::NOT_FOUND, "KNOCK_NOT_FOUND"),
            KnockError::Expired => (StatusCode::GONE, "KNOCK_EXPIRED"),
            KnockError::AlreadyResolved(_) => (StatusCode::GONE, "KNOCK_ALREADY_RESOLVED"),
            KnockError::NotApproved => (StatusCode::FORBIDDEN, "ENTRY_NOT_PERMITTED"),
            KnockError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        },
        ServiceError::Session(e) => match e {
            SessionError::AlreadyActive => (StatusCode::CONFLICT, "SESSION_ALREADY_ACTIVE"),
            SessionError::NotActive => (StatusCode::CONFLICT, "SESSION_NOT_ACTIVE"),
            SessionError::AlreadyInside => (StatusCode::CONFLICT, "ALREADY_INSIDE"),
        },
        ServiceError::Room(e) => match e {
            RoomError::AccessEntryNotFound(_) => (StatusCode::NOT_FOUND, "ACCESS_ENTRY_NOT_FOUND"),
            RoomError::NotOwner => (StatusCode::FORBIDDEN, "NOT_ROOM_OWNER"),
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Service(err) => map_service(err),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = json!({
            "error": status.as_u16(),
            "reason": reason,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_maps_to_403_with_reason() {
        let err = ApiError::Service(ServiceError::Forbidden(ForbiddenReason::DoorDnd));
        let (status, reason) = match &err {
            ApiError::Service(e) => map_service(e),
            _ => unreachable!(),
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(reason, "DOOR_DND");
    }

    #[test]
    fn test_taxonomy_status_codes() {
        let cases = [
            (
                ServiceError::Knock(KnockError::AlreadyPending),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Knock(KnockError::RateLimited { retry_after_secs: 60 }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ServiceError::Knock(KnockError::Expired),
                StatusCode::GONE,
            ),
            (
                ServiceError::Session(SessionError::AlreadyInside),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::RoomNotFound(peoplesroom_core::core_room::UserId::new("x")),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(map_service(&err).0, expected, "wrong status for {:?}", err);
        }
    }
}
