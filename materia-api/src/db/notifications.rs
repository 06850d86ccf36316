//! Notification rows
//!
//! Rows are written only by the notification dispatcher and afterwards
//! mutated only to flip `read`.

use materia_common::db::Notification;
use materia_common::{time, Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    let id: String = row.get("id");
    let material_id: Option<String> = row.get("material_id");
    let category: String = row.get("category");
    let created_at: String = row.get("created_at");
    let parse = |value: &str| {
        Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt notification id '{}': {}", value, e)))
    };

    Ok(Notification {
        id: parse(&id)?,
        recipient_id: row.get("recipient_id"),
        related_material_id: material_id.as_deref().map(parse).transpose()?,
        title: row.get("title"),
        body: row.get("body"),
        category: category.parse()?,
        link: row.get("link"),
        read: row.get("read"),
        created_at: time::from_db(&created_at)?,
    })
}

pub async fn insert_notification(conn: &mut SqliteConnection, notification: &Notification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, recipient_id, material_id, title, body, category, link, read, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(notification.id.to_string())
    .bind(&notification.recipient_id)
    .bind(notification.related_material_id.map(|id| id.to_string()))
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.category.as_str())
    .bind(&notification.link)
    .bind(notification.read)
    .bind(time::to_db(&notification.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Notifications of one recipient, newest first
pub async fn list_for_recipient(conn: &mut SqliteConnection, recipient_id: &str) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        r#"
        SELECT id, recipient_id, material_id, title, body, category, link, read, created_at
        FROM notifications
        WHERE recipient_id = ?
        ORDER BY created_at DESC, id
        "#,
    )
    .bind(recipient_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(notification_from_row).collect()
}

/// Mark one notification read; false unless it belongs to the recipient
pub async fn mark_read(conn: &mut SqliteConnection, id: Uuid, recipient_id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND recipient_id = ?")
        .bind(id.to_string())
        .bind(recipient_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(conn: &mut SqliteConnection, recipient_id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE recipient_id = ? AND read = 0")
        .bind(recipient_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Null out references to a material that is about to disappear
pub async fn detach_material(conn: &mut SqliteConnection, material_id: Uuid) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET material_id = NULL WHERE material_id = ?")
        .bind(material_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_for_recipient(conn: &mut SqliteConnection, recipient_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = ?")
        .bind(recipient_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
