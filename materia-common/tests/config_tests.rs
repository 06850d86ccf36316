//! Configuration loading tests
//!
//! Tests that touch MATERIA_* environment variables are marked #[serial]
//! so they never observe each other's values.

use materia_common::config::{
    CollaboratorMatchKey, MediaBackend, ServiceConfig, CONFIG_ENV_VAR, MEDIA_KEY_ENV_VAR,
    ROOT_ENV_VAR, TOKEN_SECRET_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
fn test_empty_toml_yields_defaults() {
    let config = ServiceConfig::from_toml_str("").unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.media.backend, MediaBackend::Local);
    assert_eq!(config.collaborators.match_key, CollaboratorMatchKey::Email);
    assert_eq!(config.notifications.queue_capacity, 256);
    assert!(config.auth.token_secret.is_empty());
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let config = ServiceConfig::from_toml_str(
        r#"
        [server]
        port = 9000

        [collaborators]
        match_key = "user_id"

        [auth]
        admin_emails = ["root@example.com"]
        "#,
    )
    .unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.auth.admin_emails, vec!["root@example.com"]);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.collaborators.match_key, CollaboratorMatchKey::UserId);
}

#[test]
fn test_unknown_match_key_is_config_error() {
    let result = ServiceConfig::from_toml_str(
        r#"
        [collaborators]
        match_key = "phone"
        "#,
    );
    assert!(matches!(result, Err(materia_common::Error::Config(_))));
}

#[test]
fn test_http_backend_requires_endpoint_and_key() {
    let mut config = ServiceConfig::from_toml_str(
        r#"
        [media]
        backend = "http"
        "#,
    )
    .unwrap();
    assert!(config.validate().is_err());

    config.media.endpoint = Some("https://storage.example.com/storage/v1".to_string());
    assert!(config.validate().is_err(), "service key still missing");

    config.media.service_key = Some("service-key".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_queue_capacity_rejected() {
    let mut config = ServiceConfig::default();
    config.notifications.queue_capacity = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_database_path_defaults_into_root_folder() {
    let config = ServiceConfig::default();
    let root = PathBuf::from("/tmp/materia-root");
    assert_eq!(config.database_path(&root), root.join("materia.db"));

    let config = ServiceConfig::from_toml_str(
        r#"
        [database]
        path = "/srv/catalog.db"
        "#,
    )
    .unwrap();
    assert_eq!(config.database_path(&root), PathBuf::from("/srv/catalog.db"));
}

#[test]
#[serial]
fn test_root_folder_priority_order() {
    env::remove_var(ROOT_ENV_VAR);
    let config = ServiceConfig::from_toml_str(r#"root_folder = "/from/toml""#).unwrap();

    // CLI beats everything
    assert_eq!(
        config.resolve_root_folder(Some(Path::new("/from/cli"))),
        PathBuf::from("/from/cli")
    );

    // Environment beats TOML
    env::set_var(ROOT_ENV_VAR, "/from/env");
    assert_eq!(config.resolve_root_folder(None), PathBuf::from("/from/env"));
    env::remove_var(ROOT_ENV_VAR);

    // TOML beats compiled default
    assert_eq!(config.resolve_root_folder(None), PathBuf::from("/from/toml"));

    // Compiled default is never empty
    let default_root = ServiceConfig::default().resolve_root_folder(None);
    assert!(!default_root.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_load_explicit_file_with_env_overrides() {
    env::remove_var(CONFIG_ENV_VAR);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [auth]
        token_secret = "from-file"

        [media]
        backend = "http"
        endpoint = "https://storage.example.com/storage/v1"
        "#
    )
    .unwrap();

    env::set_var(TOKEN_SECRET_ENV_VAR, "from-env");
    env::set_var(MEDIA_KEY_ENV_VAR, "media-key");
    let config = ServiceConfig::load(Some(file.path()));
    env::remove_var(TOKEN_SECRET_ENV_VAR);
    env::remove_var(MEDIA_KEY_ENV_VAR);

    let config = config.unwrap();
    assert_eq!(config.auth.token_secret, "from-env");
    assert_eq!(config.media.service_key.as_deref(), Some("media-key"));
}

#[test]
#[serial]
fn test_load_missing_explicit_file_fails() {
    let result = ServiceConfig::load(Some(Path::new("/nonexistent/materia/config.toml")));
    assert!(result.is_err());
}
