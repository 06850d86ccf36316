//! Catalog services
//!
//! Transport-independent logic behind the HTTP handlers: the aggregate
//! writer and its helpers, the moderation state machine, notification
//! dispatch, media ingestion and caller identity.

pub mod collaborators;
pub mod identity;
pub mod materials;
pub mod media;
pub mod moderation;
pub mod notifications;
pub mod permissions;
pub mod steps;

pub use collaborators::CollaboratorResolver;
pub use identity::{Identity, IdentityResolver, TokenIdentityResolver};
pub use materials::{MaterialFields, MaterialWriter, MediaUploads};
pub use media::{HttpMediaStore, LocalMediaStore, MediaBlob, MediaStore};
pub use moderation::Moderator;
pub use notifications::{NotificationDispatcher, NotificationJob};
pub use permissions::Caller;
