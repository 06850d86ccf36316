//! Material gallery operations

use materia_common::db::GalleryEntry;
use materia_common::{time, Result};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Gallery of a material in upload order
pub async fn list_gallery(conn: &mut SqliteConnection, material_id: Uuid) -> Result<Vec<GalleryEntry>> {
    let rows = sqlx::query(
        "SELECT id, image_url, caption FROM material_gallery WHERE material_id = ? ORDER BY id",
    )
    .bind(material_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| GalleryEntry {
            id: row.get("id"),
            image_url: row.get("image_url"),
            caption: row.get("caption"),
        })
        .collect())
}

pub async fn insert_entry(
    conn: &mut SqliteConnection,
    material_id: Uuid,
    image_url: &str,
    caption: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO material_gallery (material_id, image_url, caption, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(material_id.to_string())
    .bind(image_url)
    .bind(caption)
    .bind(time::now_db())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update_caption(conn: &mut SqliteConnection, entry_id: i64, caption: &str) -> Result<()> {
    sqlx::query("UPDATE material_gallery SET caption = ? WHERE id = ?")
        .bind(caption)
        .bind(entry_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Remove the whole gallery of a material; zero rows is not an error
pub async fn delete_gallery_for_material(conn: &mut SqliteConnection, material_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM material_gallery WHERE material_id = ?")
        .bind(material_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
