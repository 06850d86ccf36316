//! materia-api library - material catalog service
//!
//! HTTP surface, persistence and services for a moderated catalog of
//! composite material records.

use std::sync::Arc;

use axum::Router;
use materia_common::config::ServiceConfig;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{
    CollaboratorResolver, IdentityResolver, MaterialWriter, MediaStore, Moderator,
    NotificationDispatcher, TokenIdentityResolver,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub writer: MaterialWriter,
    pub moderator: Moderator,
    pub dispatcher: NotificationDispatcher,
    pub identity: Arc<dyn IdentityResolver>,
    /// Emails granted the administrator role on first registration
    pub admin_emails: Arc<Vec<String>>,
}

impl AppState {
    /// Wire services from configuration
    ///
    /// Starts the notification worker, so this must run inside a tokio
    /// runtime.
    pub fn new(db: SqlitePool, media: Arc<dyn MediaStore>, config: &ServiceConfig) -> Self {
        let dispatcher = NotificationDispatcher::start(db.clone(), config.notifications.queue_capacity);
        let identity: Arc<dyn IdentityResolver> = Arc::new(TokenIdentityResolver::new(
            config.auth.token_secret.clone(),
            db.clone(),
        ));
        Self::with_identity(db, media, dispatcher, identity, config)
    }

    /// Same as [`AppState::new`] with an explicit identity resolver
    pub fn with_identity(
        db: SqlitePool,
        media: Arc<dyn MediaStore>,
        dispatcher: NotificationDispatcher,
        identity: Arc<dyn IdentityResolver>,
        config: &ServiceConfig,
    ) -> Self {
        let writer = MaterialWriter::new(
            db.clone(),
            media,
            CollaboratorResolver::new(config.collaborators.match_key),
            dispatcher.clone(),
        );
        let moderator = Moderator::new(db.clone(), dispatcher.clone());

        Self {
            db,
            writer,
            moderator,
            dispatcher,
            identity,
            admin_emails: Arc::new(
                config
                    .auth
                    .admin_emails
                    .iter()
                    .map(|e| e.trim().to_ascii_lowercase())
                    .collect(),
            ),
        }
    }
}

/// Build application router
///
/// Public routes need no credentials. Everything else passes the identity
/// middleware first and then, where required, a role gate.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let authors = api::materials::author_routes()
        .route_layer(middleware::from_fn(api::auth::require_author));

    let admins = Router::new()
        .merge(api::materials::admin_routes())
        .merge(api::moderation::admin_routes())
        .merge(api::users::admin_routes())
        .route_layer(middleware::from_fn(api::auth::require_admin));

    let protected = Router::new()
        .merge(api::users::member_routes())
        .merge(api::notifications::notification_routes())
        .merge(authors)
        .merge(admins)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::identity_middleware,
        ));

    let public = Router::new()
        .merge(api::health::health_routes())
        .merge(api::materials::public_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
