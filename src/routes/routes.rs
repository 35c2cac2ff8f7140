//! Defines routes for the gallery API.
//!
//! ## Structure
//! - **Health**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Accounts** (`/auth`)
//!   - `POST   /auth/register`: create a user
//!   - `POST   /auth/login`   : exchange email + password for a token
//!   - `GET    /auth/profile` : the authenticated user
//!
//! - **Albums** (`/album`, token required)
//!   - `GET    /album/`                        : list own albums
//!   - `POST   /album/`                        : create album
//!   - `DELETE /album/delete_all/`             : staff only, delete every album
//!   - `GET    /album/{path}`                  : album with images
//!   - `POST   /album/{path}`                  : multipart image upload
//!   - `DELETE /album/{path}`                  : delete album
//!   - `GET    /album/{album_path}/{img_path}` : image detail
//!   - `DELETE /album/{album_path}/{img_path}` : delete image

use crate::{
    handlers::{
        account_handlers::{login, profile, register},
        album_handlers::{
            album_detail, create_album, delete_album, delete_all_albums, list_albums,
            upload_images,
        },
        health_handlers::{healthz, readyz},
        image_handlers::{delete_image, image_detail},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Build the router for every gallery route.
///
/// `max_upload_bytes` caps request bodies so multi-file uploads are not cut
/// off by the framework's small default limit.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // accounts
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
        // albums
        .route("/album/", get(list_albums).post(create_album))
        .route("/album/delete_all/", delete(delete_all_albums))
        .route(
            "/album/{path}",
            get(album_detail).post(upload_images).delete(delete_album),
        )
        // images
        .route(
            "/album/{album_path}/{img_path}",
            get(image_detail).delete(delete_image),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
