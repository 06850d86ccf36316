//! Caller identity resolution
//!
//! With a token secret configured, callers present an HS256-signed bearer
//! token whose `sub` claim is their user id. With an empty secret the
//! `X-User-Id` header is trusted as-is, for development or when an
//! authenticating gateway sits in front of the service. Either way the
//! role comes from the users table; unknown users are readers.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use materia_common::db::Role;
use materia_common::Result;
use serde::Deserialize;
use sha2::Sha256;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use crate::db::users;

/// Header trusted when token verification is disabled
pub const USER_ID_HEADER: &str = "x-user-id";

/// Outcome of resolving a request's caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub caller_id: String,
    pub role: Role,
    pub authenticated: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            caller_id: String::new(),
            role: Role::Reader,
            authenticated: false,
        }
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Unsupported algorithm: {0}")]
    Algorithm(String),

    #[error("Invalid signature")]
    Signature,

    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
}

/// Claims read from a verified token
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
}

type HmacSha256 = Hmac<Sha256>;

fn decode_segment(segment: &str) -> std::result::Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(e.to_string()))
}

/// Verify an HS256 token and return its claims
pub fn verify_token(secret: &[u8], token: &str, now: i64) -> std::result::Result<TokenClaims, TokenError> {
    let mut parts = token.split('.');
    let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(TokenError::Malformed("expected three segments".to_string())),
    };

    let token_header: TokenHeader = serde_json::from_slice(&decode_segment(header)?)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    if token_header.alg != "HS256" {
        return Err(TokenError::Algorithm(token_header.alg));
    }

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TokenError::Malformed(e.to_string()))?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&decode_segment(signature)?)
        .map_err(|_| TokenError::Signature)?;

    let claims: TokenClaims = serde_json::from_slice(&decode_segment(payload)?)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    if claims.exp.map_or(false, |exp| exp <= now) {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

/// Sign claims as an HS256 token
pub fn sign_token(secret: &[u8], subject: &str, exp: Option<i64>) -> std::result::Result<String, TokenError> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => serde_json::json!({ "sub": subject, "exp": exp }),
        None => serde_json::json!({ "sub": subject }),
    };
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TokenError::Malformed(e.to_string()))?;
    mac.update(format!("{}.{}", header, payload).as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}.{}", header, payload, signature))
}

/// Bearer token (or trusted header) plus a role lookup
pub struct TokenIdentityResolver {
    secret: Vec<u8>,
    db: SqlitePool,
}

impl TokenIdentityResolver {
    pub fn new(secret: impl Into<Vec<u8>>, db: SqlitePool) -> Self {
        Self {
            secret: secret.into(),
            db,
        }
    }

    fn subject(&self, headers: &HeaderMap) -> Option<String> {
        if self.secret.is_empty() {
            return headers
                .get(USER_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
        }

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?
            .trim();

        match verify_token(&self.secret, token, materia_common::time::now().timestamp()) {
            Ok(claims) if !claims.sub.is_empty() => Some(claims.sub),
            Ok(_) => None,
            Err(e) => {
                debug!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for TokenIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity> {
        let Some(caller_id) = self.subject(headers) else {
            return Ok(Identity::anonymous());
        };

        let mut conn = self.db.acquire().await?;
        let identity = match users::find_role(&mut conn, &caller_id).await? {
            // Tombstoned users lose access
            Some((_, true)) => Identity::anonymous(),
            Some((role, false)) => Identity {
                caller_id,
                role,
                authenticated: true,
            },
            None => Identity {
                caller_id,
                role: Role::Reader,
                authenticated: true,
            },
        };
        Ok(identity)
    }
}
