//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the catalog schema.
//! Every statement is `CREATE ... IF NOT EXISTS`, so running it against an
//! existing database is a no-op.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Per-connection pragmas
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every connection to `sqlite::memory:` is a separate database, so the
/// pool is capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all catalog tables
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_materials_table(pool).await?;
    create_material_steps_table(pool).await?;
    create_material_gallery_table(pool).await?;
    create_material_collaborators_table(pool).await?;
    create_notifications_table(pool).await?;
    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'reader'
                CHECK (role IN ('reader', 'collaborator', 'administrator')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Property blocks and tools are inline JSON text owned by the row
pub async fn create_materials_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS materials (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            tools TEXT NOT NULL DEFAULT '[]',
            composition TEXT NOT NULL DEFAULT '[]',
            mechanical_properties TEXT NOT NULL DEFAULT '[]',
            perceptual_properties TEXT NOT NULL DEFAULT '[]',
            emotional_properties TEXT NOT NULL DEFAULT '[]',
            derived_from TEXT,
            creator_id TEXT NOT NULL REFERENCES users(id),
            moderation_state TEXT NOT NULL DEFAULT 'pending'
                CHECK (moderation_state IN ('pending', 'approved', 'rejected')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_materials_creator ON materials(creator_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_materials_state ON materials(moderation_state)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_materials_derived ON materials(derived_from)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_material_steps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS material_steps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            material_id TEXT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
            ordinal INTEGER NOT NULL,
            description TEXT NOT NULL,
            image_url TEXT,
            video_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (material_id, ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_material_gallery_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS material_gallery (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            material_id TEXT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
            image_url TEXT NOT NULL,
            caption TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_material_gallery_material ON material_gallery(material_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Explicit join entity between materials and collaborating users
pub async fn create_material_collaborators_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS material_collaborators (
            material_id TEXT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            PRIMARY KEY (material_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_material_collaborators_user ON material_collaborators(user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            recipient_id TEXT NOT NULL,
            material_id TEXT REFERENCES materials(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            category TEXT NOT NULL,
            link TEXT,
            read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_database_has_all_tables() {
        let pool = init_memory_database().await.unwrap();
        assert_eq!(
            table_names(&pool).await,
            vec![
                "material_collaborators",
                "material_gallery",
                "material_steps",
                "materials",
                "notifications",
                "users",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.expect("second run should be a no-op");
    }

    #[tokio::test]
    async fn test_step_ordinal_unique_per_material() {
        let pool = init_memory_database().await.unwrap();
        let now = crate::time::now_db();

        sqlx::query("INSERT INTO users (id, display_name, email, role, created_at, updated_at) VALUES ('u1', 'Ana', 'ana@x.com', 'collaborator', ?, ?)")
            .bind(&now)
            .bind(&now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO materials (id, name, creator_id, created_at, updated_at) VALUES ('m1', 'Foam', 'u1', ?, ?)")
            .bind(&now)
            .bind(&now)
            .execute(&pool)
            .await
            .unwrap();

        let insert_step = "INSERT INTO material_steps (material_id, ordinal, description, created_at, updated_at) VALUES ('m1', 1, 'mix', ?, ?)";
        sqlx::query(insert_step).bind(&now).bind(&now).execute(&pool).await.unwrap();
        let duplicate = sqlx::query(insert_step).bind(&now).bind(&now).execute(&pool).await;

        assert!(duplicate.is_err(), "duplicate ordinal should violate UNIQUE");
    }
}
