//! Material endpoints
//!
//! Create and update take `multipart/form-data`: text parts carry the
//! material fields, file parts carry media (`gallery_images[]`,
//! `step_images[<ordinal>]`, `step_videos[<ordinal>]`). Unknown parts are
//! ignored.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use materia_common::db::{Material, MaterialSummary, ModerationState};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::moderation::parse_reason;
use crate::db::materials::{self, FilterValues, MaterialFilter};
use crate::error::{ApiError, ApiResult};
use crate::services::{Caller, MaterialFields, MediaBlob, MediaUploads};
use crate::AppState;

/// Request body cap for multipart uploads
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileSlot {
    Gallery,
    StepImage(i64),
    StepVideo(i64),
}

fn indexed_ordinal(name: &str, prefix: &str) -> ApiResult<Option<i64>> {
    let Some(inner) = name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('['))
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return Ok(None);
    };
    inner
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("Invalid ordinal in field name '{}'", name)))
}

fn file_slot(name: &str) -> ApiResult<Option<FileSlot>> {
    if name == "gallery_images" || name == "gallery_images[]" {
        return Ok(Some(FileSlot::Gallery));
    }
    if let Some(ordinal) = indexed_ordinal(name, "step_images")? {
        return Ok(Some(FileSlot::StepImage(ordinal)));
    }
    if let Some(ordinal) = indexed_ordinal(name, "step_videos")? {
        return Ok(Some(FileSlot::StepVideo(ordinal)));
    }
    Ok(None)
}

/// Split a multipart body into decoded fields and media
async fn read_material_form(mut multipart: Multipart) -> ApiResult<(MaterialFields, MediaUploads)> {
    let mut text: HashMap<String, String> = HashMap::new();
    let mut media = MediaUploads::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match file_slot(&name)? {
            Some(slot) => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
                // Browsers send empty parts for untouched file inputs
                if data.is_empty() {
                    continue;
                }
                let blob = MediaBlob {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                };
                match slot {
                    FileSlot::Gallery => media.gallery.push(blob),
                    FileSlot::StepImage(ordinal) => {
                        media.step_images.insert(ordinal, blob);
                    }
                    FileSlot::StepVideo(ordinal) => {
                        media.step_videos.insert(ordinal, blob);
                    }
                }
            }
            None if field.file_name().is_some() => continue,
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
                text.insert(name, value);
            }
        }
    }

    Ok((MaterialFields::from_form(&text)?, media))
}

/// GET /materials
pub async fn list_approved(State(state): State<AppState>) -> ApiResult<Json<Vec<Material>>> {
    let mut conn = state.db.acquire().await?;
    let list = materials::list_materials(&mut conn, &MaterialFilter::approved()).await?;
    Ok(Json(list))
}

/// GET /materials/:id (approved only)
pub async fn get_approved(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Material>> {
    let mut conn = state.db.acquire().await?;
    match materials::load_material(&mut conn, id).await? {
        Some(material) if material.moderation_state == ModerationState::Approved => Ok(Json(material)),
        _ => Err(ApiError::NotFound(format!("Material {}", id))),
    }
}

/// GET /materials-summary
pub async fn list_summaries(State(state): State<AppState>) -> ApiResult<Json<Vec<MaterialSummary>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(materials::list_approved_summaries(&mut conn).await?))
}

/// GET /materials/:id/derived
pub async fn list_derived(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<Material>>> {
    let mut conn = state.db.acquire().await?;
    let filter = MaterialFilter {
        derived_from: Some(id),
        ..MaterialFilter::approved()
    };
    Ok(Json(materials::list_materials(&mut conn, &filter).await?))
}

/// GET /materials/filters
pub async fn filter_values(State(state): State<AppState>) -> ApiResult<Json<FilterValues>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(materials::approved_filter_values(&mut conn).await?))
}

/// POST /materials
pub async fn create_material(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Material>)> {
    let (fields, media) = read_material_form(multipart).await?;
    let material = state.writer.create(&caller, fields, media).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

/// PUT /materials/:id
pub async fn update_material(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<Material>> {
    let (fields, media) = read_material_form(multipart).await?;
    let material = state.writer.update(id, &caller, fields, media).await?;
    Ok(Json(material))
}

/// DELETE /materials/:id with optional `{"reason": "..."}`
pub async fn delete_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let reason = parse_reason(&body)?;
    state.writer.delete(id, reason).await?;
    Ok(Json(json!({ "message": "Material deleted", "id": id })))
}

/// GET /my/materials
pub async fn my_materials(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<Material>>> {
    let mut conn = state.db.acquire().await?;
    let filter = MaterialFilter {
        creator_id: Some(caller.id),
        ..MaterialFilter::default()
    };
    Ok(Json(materials::list_materials(&mut conn, &filter).await?))
}

/// GET /admin/materials
pub async fn admin_list(State(state): State<AppState>) -> ApiResult<Json<Vec<Material>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(materials::list_materials(&mut conn, &MaterialFilter::default()).await?))
}

/// GET /admin/materials/:id (any state)
pub async fn admin_get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Material>> {
    let mut conn = state.db.acquire().await?;
    materials::load_material(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Material {}", id)))
}

/// Routes open to everyone
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list_approved))
        .route("/materials/filters", get(filter_values))
        .route("/materials/:id", get(get_approved))
        .route("/materials/:id/derived", get(list_derived))
        .route("/materials-summary", get(list_summaries))
}

/// Routes for collaborators and administrators
pub fn author_routes() -> Router<AppState> {
    Router::new()
        .route("/materials", axum::routing::post(create_material))
        .route("/materials/:id", axum::routing::put(update_material))
        .route("/my/materials", get(my_materials))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Routes for administrators
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/materials/:id", axum::routing::delete(delete_material))
        .route("/admin/materials", get(admin_list))
        .route("/admin/materials/:id", get(admin_get))
}
