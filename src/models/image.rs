//! Represents an image stored inside an album.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// An image row. The bytes live in the blob store under `file`.
#[derive(Clone, FromRow, Debug)]
pub struct Image {
    pub id: i64,
    pub album_id: i64,
    /// Blob store key, `albums/{album.path}/{path}`.
    pub file: String,
    pub height: Option<i64>,
    pub width: Option<i64>,
    /// Generated filename, unique per upload.
    pub path: String,
    /// `{album folder name}/{path}`, unique across the system.
    pub fullpath: String,
    /// Capitalized original stem. Not unique.
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Public JSON shape of an image.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ImageView {
    pub path: String,
    pub fullpath: String,
    pub name: String,
    pub modified: DateTime<Utc>,
}

impl From<&Image> for ImageView {
    fn from(image: &Image) -> Self {
        Self {
            path: image.path.clone(),
            fullpath: image.fullpath.clone(),
            name: image.name.clone(),
            modified: image.modified,
        }
    }
}

/// One rejected file in a bulk upload.
#[derive(Serialize, Debug)]
pub struct UploadFailure {
    /// Filename as sent by the client.
    pub name: String,
    pub error: serde_json::Value,
}

/// Outcome of a bulk upload. `uploaded.len() + errors.len()` equals the number of files sent.
#[derive(Serialize, Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<ImageView>,
    pub errors: Vec<UploadFailure>,
}
