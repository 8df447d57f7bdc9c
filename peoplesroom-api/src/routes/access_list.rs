//! Access-list management routes (owner only by construction: the
//! caller's own room is always the one addressed)

use crate::auth::CallerIdentity;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use peoplesroom_core::core_room::{AccessListEntry, AccessMode, UserId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AccessEntryRequest {
    pub user_id: String,
    pub access_mode: AccessMode,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /rooms/me/access-list — create or replace an entry
pub async fn set_entry(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Json(body): Json<AccessEntryRequest>,
) -> ApiResult<StatusCode> {
    state
        .service
        .set_access_entry(
            &caller,
            UserId::new(body.user_id),
            body.access_mode,
            body.notes,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /rooms/me/access-list/{userId}
pub async fn remove_entry(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .service
        .remove_access_entry(&caller, &UserId::new(user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /rooms/me/access-list
pub async fn list_entries(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> Json<Vec<AccessListEntry>> {
    let view = state.service.my_room(&caller).await;
    let mut entries: Vec<AccessListEntry> = view.room.access_list.into_values().collect();
    entries.sort_by_key(|e| e.created_at);
    Json(entries)
}
