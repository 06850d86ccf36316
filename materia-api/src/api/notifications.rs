//! Notification inbox endpoints for the calling user

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use materia_common::db::Notification;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::notifications;
use crate::error::{ApiError, ApiResult};
use crate::services::Caller;
use crate::AppState;

/// GET /notifications
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Notification>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(notifications::list_for_recipient(&mut conn, &caller.id).await?))
}

/// PUT /notifications/:id/read
///
/// Another user's notification answers 404, same as a missing one.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    if !notifications::mark_read(&mut conn, id, &caller.id).await? {
        return Err(ApiError::NotFound(format!("Notification {}", id)));
    }
    Ok(Json(json!({ "id": id, "read": true })))
}

/// PUT /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Value>> {
    let mut conn = state.db.acquire().await?;
    let updated = notifications::mark_all_read(&mut conn, &caller.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/:id/read", put(mark_read))
}
