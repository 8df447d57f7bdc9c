//! Knock creation and resolution routes

use crate::auth::CallerIdentity;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use peoplesroom_core::core_knock::Knock;
use peoplesroom_core::core_room::{KnockAction, UserId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct KnockRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: KnockAction,
    #[serde(default)]
    pub remember: bool,
}

/// POST /rooms/{ownerId}/knock
pub async fn create_knock(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(owner_id): Path<String>,
    Json(body): Json<KnockRequest>,
) -> ApiResult<(StatusCode, Json<Knock>)> {
    let knock = state
        .service
        .create_knock(&UserId::new(owner_id), &caller, body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(knock)))
}

/// POST /rooms/knocks/{visitorId}/respond — owner approves or denies
pub async fn respond_knock(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(visitor_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> ApiResult<Json<Knock>> {
    let knock = state
        .service
        .respond_knock(&caller, &UserId::new(visitor_id), body.action, body.remember)
        .await?;
    Ok(Json(knock))
}

/// GET /rooms/me/knocks — live knocks waiting on the caller
pub async fn pending_knocks(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> ApiResult<Json<Vec<Knock>>> {
    let pending = state.service.pending_knocks(&caller).await?;
    Ok(Json(pending))
}
