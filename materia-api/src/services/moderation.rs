//! Moderation state machine
//!
//! ```text
//! Pending  -> Approved | Rejected        (approve / reject)
//! Approved <-> Rejected                  (toggle, approve, reject)
//! Approved | Rejected -> Pending         (content edit by a non-administrator)
//! ```
//!
//! Approving an approved material is refused; rejecting a rejected one is
//! accepted and changes nothing. Every successful transition schedules a
//! notification to the creator.

use materia_common::db::{Material, ModerationState, Role};
use materia_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::materials;
use crate::services::notifications::{NotificationDispatcher, NotificationJob};
use crate::services::permissions::Caller;

/// Direct administrator actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    Toggle,
}

/// State after applying an administrator action
pub fn next_state(current: ModerationState, transition: Transition) -> Result<ModerationState> {
    match (transition, current) {
        (Transition::Approve, ModerationState::Approved) => {
            Err(Error::Conflict("Material is already approved".to_string()))
        }
        (Transition::Approve, _) => Ok(ModerationState::Approved),
        (Transition::Reject, _) => Ok(ModerationState::Rejected),
        (Transition::Toggle, ModerationState::Approved) => Ok(ModerationState::Rejected),
        (Transition::Toggle, _) => Ok(ModerationState::Approved),
    }
}

/// State after a successful content edit
///
/// Administrators keep the current state; anyone else sends the material
/// back to review.
pub fn state_after_edit(current: ModerationState, editor: Role) -> ModerationState {
    match editor {
        Role::Administrator => current,
        _ => ModerationState::Pending,
    }
}

/// Applies administrator transitions to stored materials
#[derive(Clone)]
pub struct Moderator {
    db: SqlitePool,
    dispatcher: NotificationDispatcher,
}

impl Moderator {
    pub fn new(db: SqlitePool, dispatcher: NotificationDispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub async fn approve(&self, id: Uuid, admin: &Caller) -> Result<Material> {
        self.apply(id, Transition::Approve, None, admin).await
    }

    pub async fn reject(&self, id: Uuid, reason: Option<String>, admin: &Caller) -> Result<Material> {
        self.apply(id, Transition::Reject, reason, admin).await
    }

    pub async fn toggle(&self, id: Uuid, admin: &Caller) -> Result<Material> {
        self.apply(id, Transition::Toggle, None, admin).await
    }

    async fn apply(
        &self,
        id: Uuid,
        transition: Transition,
        reason: Option<String>,
        admin: &Caller,
    ) -> Result<Material> {
        let mut tx = self.db.begin().await?;

        let current = materials::fetch_root(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Material {}", id)))?;
        let next = next_state(current.moderation_state, transition)?;

        materials::set_moderation_state(&mut tx, id, next).await?;
        tx.commit().await?;

        info!(
            material_id = %id,
            name = %current.name,
            admin = %admin.id,
            from = %current.moderation_state,
            to = %next,
            "Moderation transition"
        );

        let mut conn = self.db.acquire().await?;
        let material = materials::load_material(&mut conn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Material {}", id)))?;
        drop(conn);

        let reason = reason.filter(|r| !r.trim().is_empty());
        let job = match next {
            ModerationState::Approved => NotificationJob::Approved {
                material_id: id,
                material_name: material.name.clone(),
                creator_id: material.creator_id.clone(),
            },
            _ => NotificationJob::Rejected {
                material_id: id,
                material_name: material.name.clone(),
                creator_id: material.creator_id.clone(),
                reason,
            },
        };
        self.dispatcher.dispatch(job);

        Ok(material)
    }
}
