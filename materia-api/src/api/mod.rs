//! HTTP API handlers for materia-api

pub mod auth;
pub mod health;
pub mod materials;
pub mod moderation;
pub mod notifications;
pub mod users;
