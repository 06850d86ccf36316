//! Configuration loading and root folder resolution
//!
//! Settings come from a TOML file with environment overrides for secrets.
//! Every section is optional; missing keys fall back to defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "MATERIA_ROOT";
/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MATERIA_CONFIG";
/// Environment override for the bearer token secret
pub const TOKEN_SECRET_ENV_VAR: &str = "MATERIA_TOKEN_SECRET";
/// Environment override for the media storage service key
pub const MEDIA_KEY_ENV_VAR: &str = "MATERIA_MEDIA_SERVICE_KEY";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub collaborators: CollaboratorConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to `<root>/materia.db`
    pub path: Option<PathBuf>,
}

/// Where uploaded images and videos end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaBackend {
    /// Files under `<root>/media`
    #[default]
    Local,
    /// Object storage reached over HTTP
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    /// Prefix for URLs handed out by the local backend
    pub public_base_url: String,
    /// Object storage endpoint (http backend)
    pub endpoint: Option<String>,
    pub bucket: String,
    pub service_key: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Local,
            public_base_url: "http://127.0.0.1:8080/media".to_string(),
            endpoint: None,
            bucket: "materials".to_string(),
            service_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens. Empty disables verification and
    /// trusts the `X-User-Id` header instead.
    pub token_secret: String,
    /// Emails that register as administrators instead of readers
    pub admin_emails: Vec<String>,
}

/// Key used to match submitted collaborator identifiers to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorMatchKey {
    #[default]
    Email,
    UserId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub match_key: CollaboratorMatchKey,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration
    ///
    /// File priority: explicit path > `MATERIA_CONFIG` > platform config
    /// file > built-in defaults. An explicitly named file must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::read_file(path)?,
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(path) => Self::read_file(Path::new(&path))?,
                Err(_) => match default_config_file() {
                    Some(path) if path.exists() => Self::read_file(&path)?,
                    _ => {
                        info!("No config file found, using defaults");
                        Self::default()
                    }
                },
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV_VAR) {
            self.auth.token_secret = secret;
        }
        if let Ok(key) = std::env::var(MEDIA_KEY_ENV_VAR) {
            self.media.service_key = Some(key);
        }
    }

    /// Check cross-field requirements
    pub fn validate(&self) -> Result<()> {
        if self.media.backend == MediaBackend::Http {
            if self.media.endpoint.as_deref().map_or(true, str::is_empty) {
                return Err(Error::Config(
                    "media.endpoint is required for the http media backend".to_string(),
                ));
            }
            if self.media.service_key.as_deref().map_or(true, str::is_empty) {
                return Err(Error::Config(format!(
                    "media.service_key (or {}) is required for the http media backend",
                    MEDIA_KEY_ENV_VAR
                )));
            }
        }
        if self.notifications.queue_capacity == 0 {
            return Err(Error::Config(
                "notifications.queue_capacity must be positive".to_string(),
            ));
        }
        if self.auth.token_secret.is_empty() {
            warn!("auth.token_secret is empty: trusting X-User-Id header for caller identity");
        }
        Ok(())
    }

    /// Root folder resolution priority:
    /// 1. Command-line argument (highest priority)
    /// 2. Environment variable
    /// 3. TOML config file
    /// 4. OS-dependent compiled default (fallback)
    pub fn resolve_root_folder(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.root_folder {
            return path.clone();
        }
        default_root_folder()
    }

    /// Database file inside the resolved root folder unless configured
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| root_folder.join("materia.db"))
    }
}

/// Platform config file location (`~/.config/materia/config.toml` on Linux)
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("materia").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("materia"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/materia"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("materia"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/materia"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("materia"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\materia"))
    } else {
        PathBuf::from("./materia_data")
    }
}
