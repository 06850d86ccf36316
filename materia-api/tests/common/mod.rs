//! Shared fixtures for router-level tests
//!
//! Identity runs in header mode (empty token secret), so requests name
//! their caller with `X-User-Id`. Media goes to a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use materia_api::services::{LocalMediaStore, NotificationDispatcher};
use materia_api::{build_router, AppState};
use materia_common::config::ServiceConfig;
use materia_common::db::{init_memory_database, Role};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const ADMIN: &str = "root";
pub const ANA: &str = "ana";
pub const BEA: &str = "bea";
pub const READER: &str = "rex";

pub const BOUNDARY: &str = "materia-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub dispatcher: NotificationDispatcher,
    pub media_dir: TempDir,
}

/// Router over an in-memory database seeded with one administrator, two
/// collaborators and one reader
pub async fn setup() -> TestApp {
    let pool = init_memory_database().await.expect("Should create database");
    {
        let mut conn = pool.acquire().await.unwrap();
        let seed = [
            (ADMIN, "Root", "root@example.com", Role::Administrator),
            (ANA, "Ana", "ana@example.com", Role::Collaborator),
            (BEA, "Bea", "bea@example.com", Role::Collaborator),
            (READER, "Rex", "rex@example.com", Role::Reader),
        ];
        for (id, name, email, role) in seed {
            materia_api::db::users::upsert_user(&mut conn, id, name, email, role)
                .await
                .unwrap();
        }
    }

    let media_dir = TempDir::new().unwrap();
    let media = Arc::new(LocalMediaStore::new(
        media_dir.path(),
        "http://media.test/media",
    ));

    let mut config = ServiceConfig::default();
    config.auth.admin_emails = vec!["boss@example.com".to_string()];

    let state = AppState::new(pool.clone(), media, &config);
    let dispatcher = state.dispatcher.clone();

    TestApp {
        router: build_router(state),
        pool,
        dispatcher,
        media_dir,
    }
}

/// Multipart body from text fields and `(field, file name, content type, bytes)` files
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, json)
    }

    pub async fn request(&self, method: &str, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: &str, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn multipart(
        &self,
        method: &str,
        uri: &str,
        user: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &str, &[u8])],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, files)))
            .unwrap();
        self.send(request).await
    }

    /// Create a material as `user` and return its id
    pub async fn create_material(&self, user: &str, fields: &[(&str, &str)]) -> String {
        let (status, body) = self.multipart("POST", "/materials", user, fields, &[]).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Wait for queued notifications to land
    pub async fn settle(&self) {
        self.dispatcher.flush().await;
    }

    pub async fn count(&self, table: &str, material_id: &str) -> i64 {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE material_id = ?",
            table
        ))
        .bind(material_id)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}
