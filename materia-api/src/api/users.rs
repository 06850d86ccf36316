//! Registration, role requests and user administration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use materia_common::db::{Role, User};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::db::{collaborators, materials, notifications, users};
use crate::error::{ApiError, ApiResult};
use crate::services::{Caller, NotificationJob};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// POST /auth/register
///
/// Creates or refreshes the caller's own record. The role of an existing
/// user never changes here.
pub async fn register(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    let display_name = request.display_name.trim();
    let email = request.email.trim().to_ascii_lowercase();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("Display name is required".to_string()));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest(format!("Invalid email: {}", request.email)));
    }

    let mut conn = state.db.acquire().await?;
    if let Some(owner) = users::id_for_email(&mut conn, &email).await? {
        if owner != caller.id {
            return Err(ApiError::Conflict("Email is already registered".to_string()));
        }
    }

    let role = if state.admin_emails.contains(&email) {
        Role::Administrator
    } else {
        Role::Reader
    };
    let user = users::upsert_user(&mut conn, &caller.id, display_name, &email, role).await?;
    info!(user_id = %user.id, role = %user.role, "User registered");
    Ok(Json(user))
}

/// POST /users/request-collaborator
pub async fn request_collaborator(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut conn = state.db.acquire().await?;
    let user = users::get_user(&mut conn, &caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Register before requesting a role".to_string()))?;

    if user.role != Role::Reader {
        return Err(ApiError::BadRequest(format!("User is already {}", user.role)));
    }

    state.dispatcher.dispatch(NotificationJob::RoleRequested {
        user_id: user.id,
        display_name: user.display_name,
        email: user.email,
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Collaborator role requested" })),
    ))
}

/// GET /users
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(users::list_users(&mut conn).await?))
}

/// GET /users/:id
pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<User>> {
    let mut conn = state.db.acquire().await?;
    users::get_user(&mut conn, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User {}", id)))
}

/// PUT /users/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let display_name = request.display_name.as_deref().map(str::trim);
    if display_name == Some("") {
        return Err(ApiError::BadRequest("Display name cannot be blank".to_string()));
    }

    let mut conn = state.db.acquire().await?;
    if !users::update_user(&mut conn, &id, display_name, request.role).await? {
        return Err(ApiError::NotFound(format!("User {}", id)));
    }
    if let Some(role) = request.role {
        info!(user_id = %id, role = %role, "User role changed");
    }

    users::get_user(&mut conn, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User {}", id)))
}

/// DELETE /users/:id (tombstone)
pub async fn soft_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if id == caller.id {
        return Err(ApiError::BadRequest("Cannot delete yourself".to_string()));
    }

    let mut conn = state.db.acquire().await?;
    if !users::soft_delete_user(&mut conn, &id).await? {
        return Err(ApiError::NotFound(format!("User {}", id)));
    }
    info!(user_id = %id, "User tombstoned");
    Ok(Json(json!({ "message": "User deleted", "id": id })))
}

/// DELETE /users/:id/hard
///
/// Refused while the user is still the creator of any material.
pub async fn hard_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if id == caller.id {
        return Err(ApiError::BadRequest("Cannot delete yourself".to_string()));
    }

    let mut tx = state.db.begin().await?;
    if !users::user_exists(&mut tx, &id).await? {
        return Err(ApiError::NotFound(format!("User {}", id)));
    }
    let created = materials::count_by_creator(&mut tx, &id).await?;
    if created > 0 {
        return Err(ApiError::Conflict(format!(
            "User still created {} material(s)",
            created
        )));
    }

    let links = collaborators::clear_for_user(&mut tx, &id).await?;
    notifications::delete_for_recipient(&mut tx, &id).await?;
    users::delete_user(&mut tx, &id).await?;
    tx.commit().await?;

    info!(user_id = %id, collaborator_links = links, "User permanently deleted");
    Ok(Json(json!({ "message": "User permanently deleted", "id": id })))
}

/// Routes for any authenticated caller
pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/users/request-collaborator", post(request_collaborator))
}

/// Routes for administrators
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/:id", get(get_one).put(update).delete(soft_delete))
        .route("/users/:id/hard", delete(hard_delete))
}
