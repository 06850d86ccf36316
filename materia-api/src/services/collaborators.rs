//! Collaborator resolver
//!
//! Maps submitted identifiers to users with one configured match key.
//! Resolution is all-or-nothing: a single unknown identifier fails the
//! whole call, so callers resolve before touching any stored link.

use materia_common::config::CollaboratorMatchKey;
use materia_common::db::UserSummary;
use materia_common::{Error, Result};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::db::users;

#[derive(Debug, Clone, Copy)]
pub struct CollaboratorResolver {
    match_key: CollaboratorMatchKey,
}

impl CollaboratorResolver {
    pub fn new(match_key: CollaboratorMatchKey) -> Self {
        Self { match_key }
    }

    /// Trimmed, de-duplicated identifiers in submission order
    fn normalize(&self, identifiers: &[String]) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for identifier in identifiers {
            let identifier = identifier.trim();
            if identifier.is_empty() {
                continue;
            }
            let duplicate = seen.iter().any(|s| match self.match_key {
                CollaboratorMatchKey::Email => s.eq_ignore_ascii_case(identifier),
                CollaboratorMatchKey::UserId => s == identifier,
            });
            if !duplicate {
                seen.push(identifier.to_string());
            }
        }
        seen
    }

    /// Resolve every identifier or fail with the ones that did not match
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        identifiers: &[String],
    ) -> Result<Vec<UserSummary>> {
        let requested = self.normalize(identifiers);
        let mut found = Vec::with_capacity(requested.len());
        let mut missing = Vec::new();

        for identifier in &requested {
            let user = match self.match_key {
                CollaboratorMatchKey::Email => users::find_summary_by_email(conn, identifier).await?,
                CollaboratorMatchKey::UserId => users::find_summary_by_id(conn, identifier).await?,
            };
            match user {
                Some(user) => found.push(user),
                None => missing.push(identifier.clone()),
            }
        }

        if !missing.is_empty() {
            debug!(
                requested = requested.len(),
                missing = missing.len(),
                "Collaborator resolution incomplete"
            );
            return Err(Error::PartialResolution { requested, missing });
        }

        Ok(found)
    }
}
