//! Material collaborator links
//!
//! `material_collaborators` is an explicit `(material_id, user_id)` join
//! table, cleared and refilled wholesale when a material's collaborator
//! set is replaced.

use materia_common::db::UserSummary;
use materia_common::{time, Result};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

pub async fn list_collaborators(conn: &mut SqliteConnection, material_id: Uuid) -> Result<Vec<UserSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.display_name, u.email
        FROM material_collaborators mc
        JOIN users u ON u.id = mc.user_id
        WHERE mc.material_id = ?
        ORDER BY mc.created_at, u.id
        "#,
    )
    .bind(material_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            display_name: row.get("display_name"),
            email: row.get("email"),
        })
        .collect())
}

pub async fn insert_link(conn: &mut SqliteConnection, material_id: Uuid, user_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO material_collaborators (material_id, user_id, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(material_id, user_id) DO NOTHING
        "#,
    )
    .bind(material_id.to_string())
    .bind(user_id)
    .bind(time::now_db())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Remove every link of a material; zero rows is not an error
pub async fn clear_for_material(conn: &mut SqliteConnection, material_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM material_collaborators WHERE material_id = ?")
        .bind(material_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Remove every link of a user across all materials
pub async fn clear_for_user(conn: &mut SqliteConnection, user_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM material_collaborators WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
