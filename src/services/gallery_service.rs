//! GalleryService: album and image rules on top of SQLite metadata and a
//! [`BlobStore`] for file bytes.
//!
//! Deleting an album removes its storage directory first (best-effort) and
//! then its row; image rows go with it through `ON DELETE CASCADE`.

use crate::{
    models::{
        album::{Album, AlbumSummary},
        image::{Image, ImageView, UploadFailure, UploadReport},
        user::User,
    },
    services::{
        account_service::is_unique_violation,
        blob_store::BlobStore,
        paths::{self, MAX_NAME_LEN, UploadClock, UploadName},
    },
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use std::{
    collections::HashMap,
    io::{self, Cursor, ErrorKind},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("album `{0}` not found")]
    AlbumNotFound(String),
    #[error("image `{image}` not found in album `{album}`")]
    ImageNotFound { album: String, image: String },
    #[error("Name '{0}' is already taken.")]
    AlbumNameTaken(String),
    #[error("{0}")]
    InvalidAlbumName(String),
    #[error("{0}")]
    InvalidImage(String),
    #[error("image with this Full path already exists.")]
    ImageExists(String),
    #[error("staff privileges required")]
    Forbidden,
    #[error("image decoding task failed: {0}")]
    Decode(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type GalleryResult<T> = Result<T, GalleryError>;

/// A file part taken from an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

const ALBUM_COLUMNS: &str = "id, user_id, name, path, created_at, updated_at";
const IMAGE_COLUMNS: &str =
    "id, album_id, file, height, width, path, fullpath, name, created, modified";

#[derive(Clone)]
pub struct GalleryService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Where album directories and image bytes live.
    pub blobs: Arc<dyn BlobStore>,

    clock: Arc<UploadClock>,
}

impl GalleryService {
    pub fn new(db: Arc<SqlitePool>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            db,
            blobs,
            clock: Arc::new(UploadClock::new()),
        }
    }

    /// Albums owned by `user`, oldest first, each with its first image as preview.
    pub async fn list_albums(&self, user: &User) -> GalleryResult<Vec<AlbumSummary>> {
        let albums = sqlx::query_as::<_, Album>(&format!(
            "SELECT {} FROM albums WHERE user_id = ? ORDER BY id",
            ALBUM_COLUMNS
        ))
        .bind(user.id)
        .fetch_all(&*self.db)
        .await?;

        let previews: HashMap<i64, Image> = sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images
             WHERE id IN (
                 SELECT MIN(images.id) FROM images
                 JOIN albums ON albums.id = images.album_id
                 WHERE albums.user_id = ?
                 GROUP BY images.album_id
             )",
            IMAGE_COLUMNS
        ))
        .bind(user.id)
        .fetch_all(&*self.db)
        .await?
        .into_iter()
        .map(|image| (image.album_id, image))
        .collect();

        Ok(albums
            .iter()
            .map(|album| AlbumSummary::new(album, previews.get(&album.id)))
            .collect())
    }

    /// Create an album for `user`.
    ///
    /// Surrounding whitespace is dropped. The name must be unused among the
    /// user's albums and must not contain `/`. The storage path is derived here, once.
    pub async fn create_album(&self, user: &User, name: &str) -> GalleryResult<Album> {
        let name = name.trim();
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM albums WHERE user_id = ? AND name = ?")
                .bind(user.id)
                .bind(name)
                .fetch_one(&*self.db)
                .await?;
        if taken > 0 {
            return Err(GalleryError::AlbumNameTaken(name.to_string()));
        }
        paths::validate_album_name(name).map_err(GalleryError::InvalidAlbumName)?;

        let path = paths::derive_album_path(&user.email, name);
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Album>(&format!(
            "INSERT INTO albums (user_id, name, path, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {}",
            ALBUM_COLUMNS
        ))
        .bind(user.id)
        .bind(name)
        .bind(&path)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(album) => {
                info!("user {} created album {}", user.id, album.path);
                Ok(album)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(GalleryError::AlbumNameTaken(name.to_string()))
            }
            Err(err) => Err(GalleryError::Sqlx(err)),
        }
    }

    /// Look up one of `user`'s albums by its URL segment.
    ///
    /// Albums of other users are indistinguishable from missing ones.
    pub async fn find_album(&self, user: &User, segment: &str) -> GalleryResult<Album> {
        let path = paths::derive_album_path(&user.email, segment);
        sqlx::query_as::<_, Album>(&format!(
            "SELECT {} FROM albums WHERE user_id = ? AND path = ?",
            ALBUM_COLUMNS
        ))
        .bind(user.id)
        .bind(&path)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| GalleryError::AlbumNotFound(segment.to_string()))
    }

    /// Images of an album in upload order.
    pub async fn album_images(&self, album: &Album) -> GalleryResult<Vec<Image>> {
        Ok(sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE album_id = ? ORDER BY id",
            IMAGE_COLUMNS
        ))
        .bind(album.id)
        .fetch_all(&*self.db)
        .await?)
    }

    /// Delete one of `user`'s albums together with its files and images.
    pub async fn delete_album(&self, user: &User, segment: &str) -> GalleryResult<()> {
        let album = self.find_album(user, segment).await?;
        self.remove_album(&album).await
    }

    /// Delete every album of every user. Staff only.
    ///
    /// Albums are removed one by one; a failure part-way leaves the rest in place.
    pub async fn delete_all_albums(&self, actor: &User) -> GalleryResult<usize> {
        if !actor.is_staff {
            return Err(GalleryError::Forbidden);
        }

        let albums = sqlx::query_as::<_, Album>(&format!(
            "SELECT {} FROM albums ORDER BY id",
            ALBUM_COLUMNS
        ))
        .fetch_all(&*self.db)
        .await?;

        for album in &albums {
            self.remove_album(album).await?;
        }
        info!("user {} deleted all {} albums", actor.id, albums.len());
        Ok(albums.len())
    }

    /// Store each file as a new image of `album`.
    ///
    /// Files are independent: a rejected file is reported in `errors` and the
    /// rest are still processed. Nothing is rolled back. Storage or database
    /// failures abort the batch.
    pub async fn upload_images(
        &self,
        album: &Album,
        owner: &User,
        files: Vec<UploadedFile>,
    ) -> GalleryResult<UploadReport> {
        let mut report = UploadReport::default();
        for file in files {
            match self.create_image(album, owner, &file.file_name, file.bytes).await {
                Ok(image) => report.uploaded.push(ImageView::from(&image)),
                Err(GalleryError::InvalidImage(message)) => report.errors.push(UploadFailure {
                    name: file.file_name,
                    error: json!({ "file": [message] }),
                }),
                Err(err @ GalleryError::ImageExists(_)) => report.errors.push(UploadFailure {
                    name: file.file_name,
                    error: json!({ "fullpath": [err.to_string()] }),
                }),
                Err(err) => return Err(err),
            }
        }
        debug!(
            "album {}: {} uploaded, {} rejected",
            album.path,
            report.uploaded.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Validate, store and record a single uploaded image.
    ///
    /// The bytes must decode as an image; its dimensions are recorded. If the
    /// row cannot be inserted the stored file is removed again.
    pub async fn create_image(
        &self,
        album: &Album,
        owner: &User,
        original_name: &str,
        bytes: Bytes,
    ) -> GalleryResult<Image> {
        let UploadName { stored, display } =
            paths::upload_name(original_name, owner.id, self.clock.next_stamp());
        let fullpath = format!("{}/{}", album.folder_name(), stored);
        if fullpath.chars().count() > MAX_NAME_LEN {
            return Err(GalleryError::InvalidImage(format!(
                "Ensure this field has no more than {} characters.",
                MAX_NAME_LEN
            )));
        }
        if bytes.is_empty() {
            return Err(GalleryError::InvalidImage(EMPTY_FILE.into()));
        }
        let (width, height) = decode_dimensions(bytes.clone()).await?;

        let key = format!("{}/{}", album.storage_dir(), stored);
        self.blobs.write(&key, bytes).await?;

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Image>(&format!(
            "INSERT INTO images (album_id, file, height, width, path, fullpath, name, created, modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(album.id)
        .bind(&key)
        .bind(i64::from(height))
        .bind(i64::from(width))
        .bind(&stored)
        .bind(&fullpath)
        .bind(&display)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(image) => Ok(image),
            Err(err) => {
                if let Err(cleanup) = self.blobs.delete(&key).await {
                    log_storage_failure("file", &key, &cleanup);
                }
                if is_unique_violation(&err) {
                    Err(GalleryError::ImageExists(fullpath))
                } else {
                    Err(GalleryError::Sqlx(err))
                }
            }
        }
    }

    /// Look up an image by album segment and generated filename, scoped to `user`.
    pub async fn find_image(
        &self,
        user: &User,
        album_segment: &str,
        image_path: &str,
    ) -> GalleryResult<(Album, Image)> {
        let album = self.find_album(user, album_segment).await?;
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE album_id = ? AND path = ? ORDER BY id LIMIT 1",
            IMAGE_COLUMNS
        ))
        .bind(album.id)
        .bind(image_path)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| GalleryError::ImageNotFound {
            album: album_segment.to_string(),
            image: image_path.to_string(),
        })?;
        Ok((album, image))
    }

    /// Delete an image's bytes, then its row.
    ///
    /// A failed file removal is logged and the row is deleted anyway.
    pub async fn delete_image(
        &self,
        user: &User,
        album_segment: &str,
        image_path: &str,
    ) -> GalleryResult<()> {
        let (_album, image) = self.find_image(user, album_segment, image_path).await?;

        if let Err(err) = self.blobs.delete(&image.file).await {
            log_storage_failure("file", &image.file, &err);
        }

        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(image.id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Two-step album removal: storage directory (errors swallowed), then row.
    async fn remove_album(&self, album: &Album) -> GalleryResult<()> {
        let dir = album.storage_dir();
        if let Err(err) = self.blobs.delete_tree(&dir).await {
            log_storage_failure("directory", &dir, &err);
        }

        sqlx::query("DELETE FROM albums WHERE id = ?")
            .bind(album.id)
            .execute(&*self.db)
            .await?;
        debug!("deleted album {}", album.path);
        Ok(())
    }
}

fn log_storage_failure(what: &str, key: &str, err: &io::Error) {
    if err.kind() == ErrorKind::NotFound {
        debug!("{} {} already missing", what, key);
    } else {
        warn!("failed to remove {} {}: {}", what, key, err);
    }
}

/// Fully decode `bytes` off the async runtime and return `(width, height)`.
async fn decode_dimensions(bytes: Bytes) -> GalleryResult<(u32, u32)> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.decode().ok())
            .map(|img| (img.width(), img.height()))
    })
    .await?;
    decoded.ok_or_else(|| GalleryError::InvalidImage(INVALID_IMAGE.into()))
}
