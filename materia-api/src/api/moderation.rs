//! Moderation endpoints (administrators only)

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use materia_common::db::{Material, ModerationState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{materials, users};
use crate::error::{ApiError, ApiResult};
use crate::services::Caller;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct ReasonBody {
    #[serde(default)]
    reason: Option<String>,
}

/// Optional `{"reason": "..."}` body; an empty body means no reason
pub(crate) fn parse_reason(body: &Bytes) -> ApiResult<Option<String>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let parsed: ReasonBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
    Ok(parsed
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty()))
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub materials: Vec<Material>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub users: i64,
}

/// PUT /materials/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Material>> {
    Ok(Json(state.moderator.approve(id, &caller).await?))
}

/// PUT /materials/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Material>> {
    let reason = parse_reason(&body)?;
    Ok(Json(state.moderator.reject(id, reason, &caller).await?))
}

/// PUT /materials/:id/toggle
pub async fn toggle(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Material>> {
    Ok(Json(state.moderator.toggle(id, &caller).await?))
}

/// GET /admin/materials/pending
pub async fn pending(State(state): State<AppState>) -> ApiResult<Json<PendingResponse>> {
    let mut conn = state.db.acquire().await?;
    let filter = materials::MaterialFilter {
        state: Some(ModerationState::Pending),
        ..Default::default()
    };
    let list = materials::list_materials(&mut conn, &filter).await?;
    Ok(Json(PendingResponse {
        total: list.len(),
        materials: list,
    }))
}

/// GET /admin/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(StatsResponse {
        pending: materials::count_by_state(&mut conn, ModerationState::Pending).await?,
        approved: materials::count_by_state(&mut conn, ModerationState::Approved).await?,
        rejected: materials::count_by_state(&mut conn, ModerationState::Rejected).await?,
        users: users::count_users(&mut conn).await?,
    }))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/materials/:id/approve", put(approve))
        .route("/materials/:id/reject", put(reject))
        .route("/materials/:id/toggle", put(toggle))
        .route("/admin/materials/pending", get(pending))
        .route("/admin/stats", get(stats))
}
