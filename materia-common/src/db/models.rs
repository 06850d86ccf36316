//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::properties::{Component, PropertyEntry};
use crate::Error;

/// User role as supplied by the identity resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reader,
    Collaborator,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Collaborator => "collaborator",
            Role::Administrator => "administrator",
        }
    }

    /// Collaborators and administrators may author materials
    pub fn can_author(&self) -> bool {
        matches!(self, Role::Collaborator | Role::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(Role::Reader),
            "collaborator" => Ok(Role::Collaborator),
            "administrator" => Ok(Role::Administrator),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Visibility status of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationState {
    Pending,
    Approved,
    Rejected,
}

impl ModerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationState::Pending => "pending",
            ModerationState::Approved => "approved",
            ModerationState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ModerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ModerationState::Pending),
            "approved" => Ok(ModerationState::Approved),
            "rejected" => Ok(ModerationState::Rejected),
            other => Err(Error::Internal(format!("Unknown moderation state: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User fields embedded in material responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub display_name: String,
    pub email: String,
}

/// One ordered stage of the construction narrative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub ordinal: i64,
    pub description: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: i64,
    pub image_url: String,
    pub caption: String,
}

/// Material aggregate: root row plus its dependents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tools: Vec<String>,
    pub composition: Vec<Component>,
    pub mechanical_properties: Vec<PropertyEntry>,
    pub perceptual_properties: Vec<PropertyEntry>,
    pub emotional_properties: Vec<PropertyEntry>,
    pub derived_from: Option<Uuid>,
    pub creator_id: String,
    pub creator: Option<UserSummary>,
    pub moderation_state: ModerationState,
    pub collaborators: Vec<UserSummary>,
    pub gallery: Vec<GalleryEntry>,
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog card for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub composition: Vec<Component>,
    pub tools: Vec<String>,
    pub derived_from: Option<Uuid>,
    pub moderation_state: ModerationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Submitted,
    Edited,
    Approved,
    Rejected,
    Info,
    RoleRequest,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Submitted => "submitted",
            NotificationCategory::Edited => "edited",
            NotificationCategory::Approved => "approved",
            NotificationCategory::Rejected => "rejected",
            NotificationCategory::Info => "info",
            NotificationCategory::RoleRequest => "role_request",
        }
    }
}

impl FromStr for NotificationCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(NotificationCategory::Submitted),
            "edited" => Ok(NotificationCategory::Edited),
            "approved" => Ok(NotificationCategory::Approved),
            "rejected" => Ok(NotificationCategory::Rejected),
            "info" => Ok(NotificationCategory::Info),
            "role_request" => Ok(NotificationCategory::RoleRequest),
            other => Err(Error::Internal(format!("Unknown notification category: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    /// None once the material itself is gone
    pub related_material_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
