//! # Materia Common Library
//!
//! Shared code for the material catalog service including:
//! - Database models and schema initialization
//! - Property block codec
//! - Configuration loading
//! - Error types and timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod properties;
pub mod time;

pub use error::{Error, Result};
