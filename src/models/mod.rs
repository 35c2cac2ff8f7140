//! Core data models for the gallery service.
//!
//! Row types map to database tables via `sqlx::FromRow`; the `*View`,
//! `*Summary` and `*Detail` types are the JSON shapes returned to clients.

pub mod album;
pub mod image;
pub mod user;
