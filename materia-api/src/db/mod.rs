//! Row-level persistence for the catalog
//!
//! Every function takes a `&mut SqliteConnection` so the same code runs on
//! a pooled connection or inside a transaction (`&mut *tx`).

pub mod collaborators;
pub mod gallery;
pub mod materials;
pub mod notifications;
pub mod steps;
pub mod users;
