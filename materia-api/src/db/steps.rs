//! Material step operations

use materia_common::db::Step;
use materia_common::{time, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

/// Values for a step row that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub ordinal: i64,
    pub description: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

fn step_from_row(row: &SqliteRow) -> Step {
    Step {
        id: row.get("id"),
        ordinal: row.get("ordinal"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        video_url: row.get("video_url"),
    }
}

/// Steps of a material ordered by ordinal
pub async fn list_steps(conn: &mut SqliteConnection, material_id: Uuid) -> Result<Vec<Step>> {
    let rows = sqlx::query(
        r#"
        SELECT id, ordinal, description, image_url, video_url
        FROM material_steps
        WHERE material_id = ?
        ORDER BY ordinal
        "#,
    )
    .bind(material_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(step_from_row).collect())
}

pub async fn insert_step(conn: &mut SqliteConnection, material_id: Uuid, step: &NewStep) -> Result<i64> {
    let now = time::now_db();
    let result = sqlx::query(
        r#"
        INSERT INTO material_steps (material_id, ordinal, description, image_url, video_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(material_id.to_string())
    .bind(step.ordinal)
    .bind(&step.description)
    .bind(&step.image_url)
    .bind(&step.video_url)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Rewrite description and media of an existing step in place
pub async fn update_step(conn: &mut SqliteConnection, step: &Step) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE material_steps
        SET description = ?, image_url = ?, video_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&step.description)
    .bind(&step.image_url)
    .bind(&step.video_url)
    .bind(time::now_db())
    .bind(step.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_step(conn: &mut SqliteConnection, step_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM material_steps WHERE id = ?")
        .bind(step_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Remove every step of a material; zero rows is not an error
pub async fn delete_steps_for_material(conn: &mut SqliteConnection, material_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM material_steps WHERE material_id = ?")
        .bind(material_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
