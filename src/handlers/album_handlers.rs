//! HTTP handlers for albums: listing, creation, detail, deletion and bulk upload.

use crate::{
    errors::AppError,
    middleware::auth::AuthUser,
    models::{
        album::{AlbumDetail, AlbumSummary},
        image::UploadReport,
    },
    services::{account_service::FieldErrors, gallery_service::UploadedFile},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

/// `GET /album/`: the caller's albums, each with one preview image.
pub async fn list_albums(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<AlbumSummary>>, AppError> {
    Ok(Json(state.gallery.list_albums(&user).await?))
}

/// `POST /album/`: create an album.
pub async fn create_album(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let name = album_name(payload.get("name"))
        .map_err(|msg| AppError::field(StatusCode::BAD_REQUEST, "name", msg))?;
    let album = state.gallery.create_album(&user, &name).await?;
    Ok((StatusCode::CREATED, Json(AlbumSummary::new(&album, None))))
}

/// `GET /album/{path}`: album with all of its images.
pub async fn album_detail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(path): Path<String>,
) -> Result<Json<AlbumDetail>, AppError> {
    let album = state.gallery.find_album(&user, &path).await?;
    let images = state.gallery.album_images(&album).await?;
    Ok(Json(AlbumDetail::new(&album, &images)))
}

/// `DELETE /album/{path}`: remove the album, its directory and its images.
pub async fn delete_album(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(path): Path<String>,
) -> Result<StatusCode, AppError> {
    state.gallery.delete_album(&user, &path).await?;
    Ok(StatusCode::OK)
}

/// `POST /album/{path}`: multipart upload of any number of image files.
///
/// The album is resolved before the body is looked at, so an unknown album
/// is a 404 even for a malformed upload.
pub async fn upload_images(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(path): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReport>, AppError> {
    let album = state.gallery.find_album(&user, &path).await?;

    let no_files = || AppError::fields(StatusCode::BAD_REQUEST, FieldErrors::new());
    let mut multipart = multipart.map_err(|_| no_files())?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile { file_name, bytes });
    }
    if files.is_empty() {
        return Err(no_files());
    }

    let report = state.gallery.upload_images(&album, &user, files).await?;
    Ok(Json(report))
}

/// `DELETE /album/delete_all/`: staff only.
pub async fn delete_all_albums(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, AppError> {
    state.gallery.delete_all_albums(&user).await?;
    Ok(StatusCode::OK)
}

/// Read the `name` field of an album body. Numbers are taken as their text.
fn album_name(value: Option<&Value>) -> Result<String, &'static str> {
    match value {
        None => Err("This field is required."),
        Some(Value::Null) => Err("This field may not be null."),
        Some(Value::String(name)) => Ok(name.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err("Not a valid string."),
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(status, err.body_text())
    } else if status.is_client_error() {
        tracing::debug!("rejected multipart body: {}", err);
        AppError::fields(StatusCode::BAD_REQUEST, FieldErrors::new())
    } else {
        AppError::internal(err)
    }
}
