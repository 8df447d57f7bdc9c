//! Route table

pub mod access_list;
pub mod knocks;
pub mod rooms;
pub mod ws;

use crate::state::AppState;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::json;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rooms/me", get(rooms::my_room))
        .route("/rooms/me/settings", patch(rooms::update_settings))
        .route("/rooms/me/enter", post(rooms::owner_enter))
        .route("/rooms/me/exit", post(rooms::owner_exit))
        .route(
            "/rooms/me/access-list",
            get(access_list::list_entries).post(access_list::set_entry),
        )
        .route(
            "/rooms/me/access-list/:user_id",
            delete(access_list::remove_entry),
        )
        .route("/rooms/me/knocks", get(knocks::pending_knocks))
        .route("/rooms/knocks/:visitor_id/respond", post(knocks::respond_knock))
        .route("/rooms/:owner_id/status", get(rooms::room_status))
        .route("/rooms/:owner_id/knock", post(knocks::create_knock))
        .route("/rooms/:owner_id/enter", post(rooms::visitor_enter))
        .route("/rooms/:owner_id/leave", post(rooms::visitor_leave))
        .route("/ws", get(ws::event_channel))
        .with_state(state)
}

/// Liveness probe
async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::USER_ID_HEADER;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use peoplesroom_core::config::Config;
    use peoplesroom_core::core_access::{StaticTierProvider, TierPolicy};
    use peoplesroom_core::core_room::{RoomService, TierLabel};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = Config::default();
        let provider = StaticTierProvider::new(TierLabel::new("OTHERS"));
        let service = Arc::new(RoomService::new(
            config.rooms.clone(),
            TierPolicy::standard(),
            Arc::new(provider),
        ));
        router(AppState {
            service,
            config: Arc::new(config),
        })
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = app()
            .oneshot(request("GET", "/healthz", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_identity_required() {
        let response = app()
            .oneshot(request("GET", "/rooms/me", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_my_room_creates_lazily() {
        let response = app()
            .oneshot(request("GET", "/rooms/me", Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_of_unknown_room_is_404() {
        let response = app()
            .oneshot(request("GET", "/rooms/alice/status", Some("bob"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_knock_and_duplicate_conflict() {
        let app = app();

        // Materialize alice's room
        let response = app
            .clone()
            .oneshot(request("GET", "/rooms/me", Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/rooms/alice/knock",
                Some("bob"),
                Some(r#"{"message":"hi"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/rooms/alice/knock",
                Some("bob"),
                Some(r#"{}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_enter_without_permission_is_403() {
        let app = app();

        app.clone()
            .oneshot(request("GET", "/rooms/me", Some("alice"), None))
            .await
            .unwrap();
        app.clone()
            .oneshot(request("POST", "/rooms/me/enter", Some("alice"), None))
            .await
            .unwrap();

        // Bob's tier default is knock, so direct entry is forbidden
        let response = app
            .clone()
            .oneshot(request("POST", "/rooms/alice/enter", Some("bob"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_owner_double_enter_conflicts() {
        let app = app();

        app.clone()
            .oneshot(request("POST", "/rooms/me/enter", Some("alice"), None))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(request("POST", "/rooms/me/enter", Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_settings_patch_and_locked_knock() {
        let app = app();

        app.clone()
            .oneshot(request("GET", "/rooms/me", Some("alice"), None))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(
                "PATCH",
                "/rooms/me/settings",
                Some("alice"),
                Some(r#"{"door_state":"LOCKED"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/rooms/alice/knock",
                Some("bob"),
                Some(r#"{}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_access_list_roundtrip() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/rooms/me/access-list",
                Some("alice"),
                Some(r#"{"user_id":"bob","access_mode":"NEVER_ALLOW"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Bob can no longer see the room
        let response = app
            .clone()
            .oneshot(request("GET", "/rooms/alice/status", Some("bob"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request(
                "DELETE",
                "/rooms/me/access-list/bob",
                Some("alice"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Deleting again is a 404
        let response = app
            .clone()
            .oneshot(request(
                "DELETE",
                "/rooms/me/access-list/bob",
                Some("alice"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
