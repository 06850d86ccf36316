//! Identity and role middleware
//!
//! `identity_middleware` resolves the caller for every protected route and
//! stores a [`Caller`] in the request extensions; 401 when no caller can
//! be established. The role gates run after it and answer 403.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use materia_common::db::Role;
use tracing::debug;

use crate::error::ApiError;
use crate::services::permissions::{can_author, Caller};
use crate::AppState;

/// Resolve the caller or reject the request
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = state.identity.resolve(request.headers()).await?;
    if !identity.authenticated {
        debug!(path = %request.uri().path(), "Unauthenticated request rejected");
        return Err(ApiError::Unauthorized(
            "Missing or invalid credentials".to_string(),
        ));
    }

    request
        .extensions_mut()
        .insert(Caller::new(identity.caller_id, identity.role));
    Ok(next.run(request).await)
}

/// Collaborators and administrators only
pub async fn require_author(
    Extension(caller): Extension<Caller>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !can_author(&caller) {
        return Err(ApiError::Forbidden(
            "Collaborator or administrator role required".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Administrators only
pub async fn require_admin(
    Extension(caller): Extension<Caller>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if caller.role != Role::Administrator {
        return Err(ApiError::Forbidden("Administrator role required".to_string()));
    }
    Ok(next.run(request).await)
}
