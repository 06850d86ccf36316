//! materia-api - moderated material catalog service
//!
//! Loads configuration, opens the SQLite database under the resolved root
//! folder, wires the media backend and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use materia_api::services::{HttpMediaStore, LocalMediaStore, MediaStore};
use materia_api::{build_router, AppState};
use materia_common::config::{MediaBackend, ServiceConfig};
use materia_common::db::init_database;
use tower_http::services::ServeDir;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "materia-api")]
#[command(about = "Moderated catalog of composite materials")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the database and local media
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MATERIA_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting materia-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let root_folder = config.resolve_root_folder(args.root_folder.as_deref());
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let local_media_dir = root_folder.join("media");
    let media: Arc<dyn MediaStore> = match config.media.backend {
        MediaBackend::Local => {
            info!("Media stored under {}", local_media_dir.display());
            Arc::new(LocalMediaStore::new(
                local_media_dir.clone(),
                config.media.public_base_url.clone(),
            ))
        }
        MediaBackend::Http => {
            // Presence checked by ServiceConfig::validate
            let endpoint = config.media.endpoint.clone().unwrap_or_default();
            let key = config.media.service_key.clone().unwrap_or_default();
            info!("Media uploaded to {} (bucket {})", endpoint, config.media.bucket);
            Arc::new(HttpMediaStore::new(endpoint, config.media.bucket.clone(), key)?)
        }
    };

    let state = AppState::new(pool, media, &config);
    let mut app = build_router(state);
    if config.media.backend == MediaBackend::Local {
        app = app.nest_service("/media", ServeDir::new(local_media_dir));
    }

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("materia-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
