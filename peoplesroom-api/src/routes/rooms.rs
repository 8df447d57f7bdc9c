//! Room, settings, and presence routes

use crate::auth::CallerIdentity;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use peoplesroom_core::core_presence::Visitor;
use peoplesroom_core::core_room::{
    OwnerRoomView, Room, RoomStatusView, SettingsPatch, SessionView, UserId,
};

/// GET /rooms/me — the caller's room plus live session
pub async fn my_room(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> Json<OwnerRoomView> {
    Json(state.service.my_room(&caller).await)
}

/// PATCH /rooms/me/settings
pub async fn update_settings(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<Json<Room>> {
    let room = state.service.update_settings(&caller, patch).await?;
    Ok(Json(room))
}

/// POST /rooms/me/enter — owner starts their session
pub async fn owner_enter(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<SessionView>> {
    let session = state.service.start_session(&caller).await?;
    Ok(Json(session))
}

/// POST /rooms/me/exit — owner ends their session, evicting all visitors
pub async fn owner_exit(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<StatusCode> {
    state.service.end_session(&caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /rooms/{ownerId}/status — a viewer's status view of a room
pub async fn room_status(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(owner_id): Path<String>,
) -> ApiResult<Json<RoomStatusView>> {
    let status = state
        .service
        .room_status(&UserId::new(owner_id), &caller)
        .await?;
    Ok(Json(status))
}

/// POST /rooms/{ownerId}/enter — visitor enters a room
pub async fn visitor_enter(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(owner_id): Path<String>,
) -> ApiResult<Json<Visitor>> {
    let visitor = state
        .service
        .enter_room(&UserId::new(owner_id), &caller)
        .await?;
    Ok(Json(visitor))
}

/// POST /rooms/{ownerId}/leave — visitor leaves (idempotent)
pub async fn visitor_leave(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(owner_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .service
        .leave_room(&UserId::new(owner_id), &caller)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
