//! Material aggregate writer
//!
//! Creates, partially updates and deletes a material together with its
//! dependents (collaborator links, gallery, steps). Each operation follows
//! the same order:
//!
//! 1. validate input and permissions, resolve collaborators
//! 2. upload media (before any row changes, so a failed upload leaves the
//!    database untouched)
//! 3. write root and dependents in one transaction
//! 4. after commit, queue the notification
//!
//! Only fields present in an update are changed. The creator of a material
//! is fixed at creation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use materia_common::db::{Material, ModerationState, UserSummary};
use materia_common::properties::{
    decode_composition, decode_properties, decode_tools, Component, PropertyDomain, PropertyEntry,
};
use materia_common::{time, Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{collaborators, gallery, materials, notifications, steps};
use crate::services::collaborators::CollaboratorResolver;
use crate::services::media::{gallery_path, step_path, MediaBlob, MediaStore, StepMediaKind};
use crate::services::moderation::state_after_edit;
use crate::services::notifications::{NotificationDispatcher, NotificationJob};
use crate::services::permissions::{can_author, can_edit, Caller};
use crate::services::steps::{decode_submitted_steps, reconcile, StepMedia, StepPlan, SubmittedStep};

/// Fields of a create or update request
///
/// `None` means the field was absent or blank. Lists are cleared by
/// sending an explicit empty JSON array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tools: Option<Vec<String>>,
    pub composition: Option<Vec<Component>>,
    pub mechanical_properties: Option<Vec<PropertyEntry>>,
    pub perceptual_properties: Option<Vec<PropertyEntry>>,
    pub emotional_properties: Option<Vec<PropertyEntry>>,
    pub derived_from: Option<Uuid>,
    pub collaborators: Option<Vec<String>>,
    pub steps: Option<Vec<SubmittedStep>>,
    pub gallery_captions: Option<Vec<String>>,
}

fn decode_string_list(field: &str, raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| Error::format(field, e.to_string()))
}

impl MaterialFields {
    /// Decode raw text form values
    ///
    /// Unknown keys are ignored. Blank values count as absent, since form
    /// clients re-send untouched inputs as empty strings.
    pub fn from_form(raw: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            raw.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let derived_from = get("derived_from")
            .map(|v| Uuid::parse_str(v).map_err(|e| Error::format("derived_from", e.to_string())))
            .transpose()?;

        Ok(Self {
            name: get("name").map(str::to_string),
            description: get("description").map(str::to_string),
            tools: get("tools").map(decode_tools).transpose()?,
            composition: get("composition").map(decode_composition).transpose()?,
            mechanical_properties: get("mechanical_properties")
                .map(|v| decode_properties(PropertyDomain::Mechanical, v))
                .transpose()?,
            perceptual_properties: get("perceptual_properties")
                .map(|v| decode_properties(PropertyDomain::Perceptual, v))
                .transpose()?,
            emotional_properties: get("emotional_properties")
                .map(|v| decode_properties(PropertyDomain::Emotional, v))
                .transpose()?,
            derived_from,
            collaborators: get("collaborators")
                .map(|v| decode_string_list("collaborators", v))
                .transpose()?,
            steps: get("steps").map(decode_submitted_steps).transpose()?,
            gallery_captions: get("gallery_captions")
                .map(|v| decode_string_list("gallery_captions", v))
                .transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the root columns carried by this request
    fn apply_to(&self, material: &mut Material) {
        if let Some(name) = &self.name {
            material.name = name.clone();
        }
        if let Some(description) = &self.description {
            material.description = Some(description.clone());
        }
        if let Some(tools) = &self.tools {
            material.tools = tools.clone();
        }
        if let Some(composition) = &self.composition {
            material.composition = composition.clone();
        }
        if let Some(entries) = &self.mechanical_properties {
            material.mechanical_properties = entries.clone();
        }
        if let Some(entries) = &self.perceptual_properties {
            material.perceptual_properties = entries.clone();
        }
        if let Some(entries) = &self.emotional_properties {
            material.emotional_properties = entries.clone();
        }
        if let Some(parent) = self.derived_from {
            material.derived_from = Some(parent);
        }
    }
}

/// Files uploaded with a create or update request
#[derive(Debug, Clone, Default)]
pub struct MediaUploads {
    pub gallery: Vec<MediaBlob>,
    pub step_images: BTreeMap<i64, MediaBlob>,
    pub step_videos: BTreeMap<i64, MediaBlob>,
}

impl MediaUploads {
    /// Step media only counts when the request also carries `steps`
    fn changes_anything(&self, fields: &MaterialFields) -> bool {
        !self.gallery.is_empty()
            || (fields.steps.is_some() && !(self.step_images.is_empty() && self.step_videos.is_empty()))
    }
}

#[derive(Clone)]
pub struct MaterialWriter {
    db: SqlitePool,
    media: Arc<dyn MediaStore>,
    resolver: CollaboratorResolver,
    dispatcher: NotificationDispatcher,
}

impl MaterialWriter {
    pub fn new(
        db: SqlitePool,
        media: Arc<dyn MediaStore>,
        resolver: CollaboratorResolver,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            media,
            resolver,
            dispatcher,
        }
    }

    /// Create a material authored by `caller`, always in review
    pub async fn create(&self, caller: &Caller, fields: MaterialFields, media: MediaUploads) -> Result<Material> {
        if !can_author(caller) {
            return Err(Error::Forbidden(
                "Only collaborators and administrators can create materials".to_string(),
            ));
        }
        let name = match fields.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(Error::InvalidInput("name is required".to_string())),
        };

        let id = Uuid::new_v4();
        let collaborator_users = {
            let mut conn = self.db.acquire().await?;
            self.check_derived_from(&mut conn, fields.derived_from, None).await?;
            match &fields.collaborators {
                Some(identifiers) => self.resolve_collaborators(&mut conn, identifiers, &caller.id).await?,
                None => Vec::new(),
            }
        };

        let submitted_steps = fields.steps.clone().unwrap_or_default();
        let gallery_urls = self.upload_gallery(id, &media.gallery).await?;
        let step_media = self.upload_step_media(id, &submitted_steps, &media).await?;
        let plan = reconcile(&[], &submitted_steps, &step_media);

        let now = time::now();
        let mut material = Material {
            id,
            name,
            description: None,
            tools: Vec::new(),
            composition: Vec::new(),
            mechanical_properties: Vec::new(),
            perceptual_properties: Vec::new(),
            emotional_properties: Vec::new(),
            derived_from: None,
            creator_id: caller.id.clone(),
            creator: None,
            moderation_state: ModerationState::Pending,
            collaborators: Vec::new(),
            gallery: Vec::new(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        fields.apply_to(&mut material);
        let captions = fields.gallery_captions.unwrap_or_default();

        let mut tx = self.db.begin().await?;
        materials::insert_material(&mut tx, &material).await?;
        for user in &collaborator_users {
            collaborators::insert_link(&mut tx, id, &user.id).await?;
        }
        for (index, url) in gallery_urls.iter().enumerate() {
            let caption = captions.get(index).map(String::as_str).unwrap_or("");
            gallery::insert_entry(&mut tx, id, url, caption).await?;
        }
        apply_step_plan(&mut tx, id, &plan).await?;
        tx.commit().await?;

        info!(
            material_id = %id,
            name = %material.name,
            creator = %caller.id,
            steps = plan.to_create.len(),
            gallery = gallery_urls.len(),
            "Material created"
        );

        let material = self.reload(id).await?;
        self.dispatcher.dispatch(NotificationJob::Submitted {
            material_id: id,
            material_name: material.name.clone(),
            author_id: caller.id.clone(),
        });
        Ok(material)
    }

    /// Apply the fields present in the request to an existing material
    pub async fn update(
        &self,
        id: Uuid,
        caller: &Caller,
        fields: MaterialFields,
        media: MediaUploads,
    ) -> Result<Material> {
        let (existing, collaborator_users) = {
            let mut conn = self.db.acquire().await?;
            let existing = materials::load_material(&mut conn, id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Material {}", id)))?;

            if !can_edit(caller, &existing) {
                return Err(Error::Forbidden(
                    "Only the creator or an administrator can edit this material".to_string(),
                ));
            }
            if fields.is_empty() && !media.changes_anything(&fields) {
                return Ok(existing);
            }

            self.check_derived_from(&mut conn, fields.derived_from, Some(id))
                .await?;
            let collaborator_users = match &fields.collaborators {
                Some(identifiers) => Some(
                    self.resolve_collaborators(&mut conn, identifiers, &existing.creator_id)
                        .await?,
                ),
                None => None,
            };
            (existing, collaborator_users)
        };

        if media.gallery.is_empty() {
            if let Some(captions) = &fields.gallery_captions {
                if captions.len() != existing.gallery.len() {
                    return Err(Error::InvalidInput(format!(
                        "gallery_captions has {} entries but the gallery has {} images",
                        captions.len(),
                        existing.gallery.len()
                    )));
                }
            }
        }

        let gallery_urls = self.upload_gallery(id, &media.gallery).await?;
        let plan = match &fields.steps {
            Some(submitted) => {
                let step_media = self.upload_step_media(id, submitted, &media).await?;
                Some(reconcile(&existing.steps, submitted, &step_media))
            }
            None => {
                if !media.step_images.is_empty() || !media.step_videos.is_empty() {
                    debug!(material_id = %id, "Step media without steps field ignored");
                }
                None
            }
        };

        let mut root = existing.clone();
        fields.apply_to(&mut root);
        root.moderation_state = state_after_edit(existing.moderation_state, caller.role);
        root.updated_at = time::now();

        let mut tx = self.db.begin().await?;
        materials::update_material(&mut tx, &root).await?;

        if let Some(users) = &collaborator_users {
            collaborators::clear_for_material(&mut tx, id).await?;
            for user in users {
                collaborators::insert_link(&mut tx, id, &user.id).await?;
            }
        }

        if !gallery_urls.is_empty() {
            let captions = fields.gallery_captions.clone().unwrap_or_default();
            gallery::delete_gallery_for_material(&mut tx, id).await?;
            for (index, url) in gallery_urls.iter().enumerate() {
                let caption = captions.get(index).map(String::as_str).unwrap_or("");
                gallery::insert_entry(&mut tx, id, url, caption).await?;
            }
        } else if let Some(captions) = &fields.gallery_captions {
            for (entry, caption) in existing.gallery.iter().zip(captions) {
                gallery::update_caption(&mut tx, entry.id, caption).await?;
            }
        }

        if let Some(plan) = &plan {
            apply_step_plan(&mut tx, id, plan).await?;
        }
        tx.commit().await?;

        info!(
            material_id = %id,
            editor = %caller.id,
            from = %existing.moderation_state,
            to = %root.moderation_state,
            "Material updated"
        );

        let material = self.reload(id).await?;
        self.dispatcher.dispatch(NotificationJob::Edited {
            material_id: id,
            material_name: material.name.clone(),
            editor_id: caller.id.clone(),
            editor_is_admin: caller.is_admin(),
            creator_id: material.creator_id.clone(),
        });
        Ok(material)
    }

    /// Remove a material and everything hanging off it
    pub async fn delete(&self, id: Uuid, reason: Option<String>) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let root = materials::fetch_root(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Material {}", id)))?;

        let links = collaborators::clear_for_material(&mut tx, id).await?;
        let images = gallery::delete_gallery_for_material(&mut tx, id).await?;
        let steps_removed = steps::delete_steps_for_material(&mut tx, id).await?;
        notifications::detach_material(&mut tx, id).await?;
        materials::delete_material(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            material_id = %id,
            name = %root.name,
            collaborators = links,
            gallery = images,
            steps = steps_removed,
            "Material deleted"
        );

        self.dispatcher.dispatch(NotificationJob::Removed {
            material_name: root.name,
            creator_id: root.creator_id,
            reason: reason.filter(|r| !r.trim().is_empty()),
        });
        Ok(())
    }

    async fn reload(&self, id: Uuid) -> Result<Material> {
        let mut conn = self.db.acquire().await?;
        materials::load_material(&mut conn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Material {}", id)))
    }

    async fn check_derived_from(
        &self,
        conn: &mut SqliteConnection,
        derived_from: Option<Uuid>,
        own_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(parent) = derived_from else {
            return Ok(());
        };
        if Some(parent) == own_id {
            return Err(Error::InvalidInput(
                "A material cannot be derived from itself".to_string(),
            ));
        }
        if !materials::material_exists(conn, parent).await? {
            return Err(Error::InvalidInput(format!(
                "derived_from references unknown material {}",
                parent
            )));
        }
        Ok(())
    }

    /// Resolve all identifiers, dropping the creator from the result
    async fn resolve_collaborators(
        &self,
        conn: &mut SqliteConnection,
        identifiers: &[String],
        creator_id: &str,
    ) -> Result<Vec<UserSummary>> {
        let users = self.resolver.resolve(conn, identifiers).await?;
        Ok(users.into_iter().filter(|u| u.id != creator_id).collect())
    }

    async fn upload_gallery(&self, id: Uuid, images: &[MediaBlob]) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(images.len());
        for (index, blob) in images.iter().enumerate() {
            urls.push(self.media.upload(blob, &gallery_path(id, index, &blob.file_name)).await?);
        }
        Ok(urls)
    }

    /// Upload step media for submitted ordinals; others are ignored
    async fn upload_step_media(
        &self,
        id: Uuid,
        submitted: &[SubmittedStep],
        media: &MediaUploads,
    ) -> Result<HashMap<i64, StepMedia>> {
        let mut uploaded: HashMap<i64, StepMedia> = HashMap::new();

        for (ordinal, blob) in &media.step_images {
            if !submitted.iter().any(|s| s.ordinal == *ordinal) {
                debug!(material_id = %id, ordinal, "Image for unknown step ignored");
                continue;
            }
            let path = step_path(id, *ordinal, StepMediaKind::Image, &blob.file_name);
            let url = self.media.upload(blob, &path).await?;
            uploaded.entry(*ordinal).or_default().image_url = Some(url);
        }
        for (ordinal, blob) in &media.step_videos {
            if !submitted.iter().any(|s| s.ordinal == *ordinal) {
                debug!(material_id = %id, ordinal, "Video for unknown step ignored");
                continue;
            }
            let path = step_path(id, *ordinal, StepMediaKind::Video, &blob.file_name);
            let url = self.media.upload(blob, &path).await?;
            uploaded.entry(*ordinal).or_default().video_url = Some(url);
        }

        Ok(uploaded)
    }
}

/// Deletes first, so a re-created ordinal never collides with a stale row
async fn apply_step_plan(conn: &mut SqliteConnection, material_id: Uuid, plan: &StepPlan) -> Result<()> {
    for step in &plan.to_delete {
        steps::delete_step(conn, step.id).await?;
    }
    for step in &plan.to_update {
        steps::update_step(conn, step).await?;
    }
    for step in &plan.to_create {
        steps::insert_step(conn, material_id, step).await?;
    }
    Ok(())
}
