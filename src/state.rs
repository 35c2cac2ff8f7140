use crate::services::{
    account_service::AccountService, blob_store::BlobStore, gallery_service::GalleryService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub gallery: GalleryService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            accounts: AccountService::new(db.clone()),
            gallery: GalleryService::new(db, blobs),
        }
    }
}
