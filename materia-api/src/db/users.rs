//! User database operations
//!
//! Users are referenced by materials and notifications but never owned by
//! them. Soft-deleted users keep their row (`deleted_at` set) so material
//! references stay valid until a hard delete.

use materia_common::db::{Role, User, UserSummary};
use materia_common::{time, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(User {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        role: role.parse()?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

fn summary_from_row(row: &SqliteRow) -> UserSummary {
    UserSummary {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
    }
}

/// Load an active (not soft-deleted) user
pub async fn get_user(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, display_name, email, role, created_at, updated_at
        FROM users
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Role and tombstone flag for any user row, active or not
pub async fn find_role(conn: &mut SqliteConnection, id: &str) -> Result<Option<(Role, bool)>> {
    let row = sqlx::query("SELECT role, deleted_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let role: String = row.get("role");
            let deleted_at: Option<String> = row.get("deleted_at");
            Ok(Some((role.parse()?, deleted_at.is_some())))
        }
        None => Ok(None),
    }
}

/// Whether a row exists for this id, tombstoned or not
pub async fn user_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Active user matching an email, case-insensitively
pub async fn find_summary_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<UserSummary>> {
    let row = sqlx::query(
        r#"
        SELECT id, display_name, email
        FROM users
        WHERE lower(email) = lower(?) AND deleted_at IS NULL
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(summary_from_row))
}

/// Active user matching a stable id
pub async fn find_summary_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<UserSummary>> {
    let row = sqlx::query(
        "SELECT id, display_name, email FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(summary_from_row))
}

/// Summary of any user row, including tombstoned ones (material creators)
pub async fn summary_any(conn: &mut SqliteConnection, id: &str) -> Result<Option<UserSummary>> {
    let row = sqlx::query("SELECT id, display_name, email FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(summary_from_row))
}

/// Id of the user (any state) owning an email, if any
pub async fn id_for_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<String>> {
    let id = sqlx::query_scalar("SELECT id FROM users WHERE lower(email) = lower(?)")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

/// Insert a user or refresh the profile fields of an existing one
///
/// The role of an existing user is left untouched.
pub async fn upsert_user(
    conn: &mut SqliteConnection,
    id: &str,
    display_name: &str,
    email: &str,
    role_if_new: Role,
) -> Result<User> {
    let now = time::now_db();

    sqlx::query(
        r#"
        INSERT INTO users (id, display_name, email, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            display_name = excluded.display_name,
            email = excluded.email,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(email)
    .bind(role_if_new.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    get_user(conn, id)
        .await?
        .ok_or_else(|| materia_common::Error::NotFound(format!("User {}", id)))
}

/// All active users, alphabetical by display name
pub async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<User>> {
    let rows = sqlx::query(
        r#"
        SELECT id, display_name, email, role, created_at, updated_at
        FROM users
        WHERE deleted_at IS NULL
        ORDER BY display_name, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(user_from_row).collect()
}

/// Ids of every active administrator
pub async fn administrator_ids(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT id FROM users WHERE role = 'administrator' AND deleted_at IS NULL ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Update profile and role of an active user; false when no such user
pub async fn update_user(
    conn: &mut SqliteConnection,
    id: &str,
    display_name: Option<&str>,
    role: Option<Role>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET display_name = COALESCE(?, display_name),
            role = COALESCE(?, role),
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(display_name)
    .bind(role.map(|r| r.as_str()))
    .bind(time::now_db())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Tombstone a user; false when the user is absent or already tombstoned
pub async fn soft_delete_user(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let now = time::now_db();
    let result = sqlx::query(
        "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove the user row itself
pub async fn delete_user(conn: &mut SqliteConnection, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Number of active users
pub async fn count_users(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use materia_common::db::init_memory_database;

    #[tokio::test]
    async fn test_upsert_keeps_existing_role() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        upsert_user(&mut conn, "u1", "Ana", "ana@x.com", Role::Reader).await.unwrap();
        update_user(&mut conn, "u1", None, Some(Role::Collaborator)).await.unwrap();
        let user = upsert_user(&mut conn, "u1", "Ana María", "ana@x.com", Role::Reader)
            .await
            .unwrap();

        assert_eq!(user.display_name, "Ana María");
        assert_eq!(user.role, Role::Collaborator);
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case_and_tombstones() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        upsert_user(&mut conn, "u1", "Ana", "Ana@X.com", Role::Reader).await.unwrap();
        assert!(find_summary_by_email(&mut conn, "ana@x.com").await.unwrap().is_some());

        assert!(soft_delete_user(&mut conn, "u1").await.unwrap());
        assert!(find_summary_by_email(&mut conn, "ana@x.com").await.unwrap().is_none());
        assert_eq!(find_role(&mut conn, "u1").await.unwrap(), Some((Role::Reader, true)));
        assert!(!soft_delete_user(&mut conn, "u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_administrator_ids_skip_other_roles() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        upsert_user(&mut conn, "a1", "Root", "root@x.com", Role::Administrator).await.unwrap();
        upsert_user(&mut conn, "u1", "Ana", "ana@x.com", Role::Collaborator).await.unwrap();

        assert_eq!(administrator_ids(&mut conn).await.unwrap(), vec!["a1".to_string()]);
        assert_eq!(count_users(&mut conn).await.unwrap(), 2);
    }
}
