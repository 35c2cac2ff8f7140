//! Represents an album: a named collection of one user's images.

use crate::{
    models::image::{Image, ImageView},
    services::paths,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// An album row.
///
/// `name` is unique per owner, `path` is unique globally because it embeds
/// the owner's email (see [`paths::derive_album_path`]).
#[derive(Clone, FromRow, Debug)]
pub struct Album {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Escaped storage key, also the directory name under `albums/`.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Album {
    /// URL segment identifying this album among its owner's albums.
    pub fn folder_name(&self) -> &str {
        paths::recover_display_name(&self.path)
    }

    /// Storage prefix holding every file of this album.
    pub fn storage_dir(&self) -> String {
        paths::album_storage_dir(&self.path)
    }
}

/// List entry: the album plus one optional preview image.
#[derive(Serialize, Debug)]
pub struct AlbumSummary {
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageView>,
}

impl AlbumSummary {
    pub fn new(album: &Album, preview: Option<&Image>) -> Self {
        Self {
            path: album.folder_name().to_string(),
            name: album.name.clone(),
            image: preview.map(ImageView::from),
        }
    }
}

/// Album with every image it contains, in upload order.
#[derive(Serialize, Debug)]
pub struct AlbumDetail {
    pub path: String,
    pub name: String,
    pub images: Vec<ImageView>,
}

impl AlbumDetail {
    pub fn new(album: &Album, images: &[Image]) -> Self {
        Self {
            path: album.folder_name().to_string(),
            name: album.name.clone(),
            images: images.iter().map(ImageView::from).collect(),
        }
    }
}
