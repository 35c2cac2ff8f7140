//! HTTP handlers for a single image, addressed as `/album/{album_path}/{img_path}`.

use crate::{
    errors::AppError, middleware::auth::AuthUser, models::image::ImageView, state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

pub async fn image_detail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((album_path, img_path)): Path<(String, String)>,
) -> Result<Json<ImageView>, AppError> {
    let (_album, image) = state
        .gallery
        .find_image(&user, &album_path, &img_path)
        .await?;
    Ok(Json(ImageView::from(&image)))
}

/// Removes the stored file and then the row.
pub async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((album_path, img_path)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .gallery
        .delete_image(&user, &album_path, &img_path)
        .await?;
    Ok(StatusCode::OK)
}
