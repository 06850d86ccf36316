//! Database initialization tests against on-disk databases

use materia_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("materia.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("materia.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO users (id, display_name, email, role, created_at, updated_at) VALUES ('u1', 'Ana', 'ana@x.com', 'reader', 'now', 'now')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Re-opening keeps existing rows
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_foreign_keys_enforced_on_every_connection() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("materia.db")).await.unwrap();

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(enabled, 1);

    // Material referencing a missing creator is refused
    let orphan = sqlx::query("INSERT INTO materials (id, name, creator_id, created_at, updated_at) VALUES ('m1', 'Foam', 'ghost', 'now', 'now')")
        .execute(&pool)
        .await;
    assert!(orphan.is_err());
}
