use crate::services::{
    account_service::{AccountError, FieldErrors},
    gallery_service::GalleryError,
};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

pub const NOT_FOUND: &str = "Not found.";
pub const SERVER_ERROR: &str = "A server error occurred.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// What an error response carries: a single `detail` message or per-field messages.
#[derive(Debug)]
pub enum ErrorBody {
    Detail(String),
    Fields(FieldErrors),
}

/// HTTP-facing error. Service errors convert into this at the handler boundary.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl AppError {
    /// Create a new AppError with a specific status and `detail` message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::Detail(msg.into()),
        }
    }

    /// Error attached to a single request field.
    pub fn field(status: StatusCode, field: &str, msg: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![msg.into()]);
        Self::fields(status, fields)
    }

    pub fn fields(status: StatusCode, fields: FieldErrors) -> Self {
        Self {
            status,
            body: ErrorBody::Fields(fields),
        }
    }

    /// Shortcut for a 500 Internal Server Error.
    ///
    /// The cause is logged; the client only sees a generic message.
    pub fn internal(cause: impl fmt::Display) -> Self {
        tracing::error!("internal error: {}", cause);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            ErrorBody::Detail(message) => write!(f, "{}", message),
            ErrorBody::Fields(fields) => write!(f, "{:?}", fields),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.body {
            ErrorBody::Detail(message) => Json(json!({ "detail": message })),
            ErrorBody::Fields(fields) => Json(json!(fields)),
        };

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err)
    }
}

/// Unparseable or mistyped JSON bodies are client errors, reported as `detail`.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("rejected JSON body: {}", rejection.body_text());
        AppError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<GalleryError> for AppError {
    fn from(err: GalleryError) -> Self {
        match err {
            GalleryError::AlbumNotFound(_) | GalleryError::ImageNotFound { .. } => {
                tracing::debug!("{}", err);
                AppError::not_found()
            }
            GalleryError::AlbumNameTaken(_) => {
                AppError::field(StatusCode::CONFLICT, "name", err.to_string())
            }
            GalleryError::InvalidAlbumName(message) => {
                AppError::field(StatusCode::BAD_REQUEST, "name", message)
            }
            GalleryError::InvalidImage(message) => {
                AppError::field(StatusCode::BAD_REQUEST, "file", message)
            }
            GalleryError::ImageExists(_) => {
                AppError::field(StatusCode::CONFLICT, "fullpath", err.to_string())
            }
            GalleryError::Forbidden => AppError::new(StatusCode::FORBIDDEN, PERMISSION_DENIED),
            GalleryError::Decode(_) | GalleryError::Sqlx(_) | GalleryError::Io(_) => {
                AppError::internal(err)
            }
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UnknownEmail(_) => AppError::not_found(),
            AccountError::WrongPassword => {
                AppError::new(StatusCode::UNAUTHORIZED, "Password is incorrect.")
            }
            AccountError::MissingCredentials => AppError::new(
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            ),
            AccountError::InvalidToken => AppError::new(StatusCode::UNAUTHORIZED, "Invalid token."),
            AccountError::Validation(fields) => AppError::fields(StatusCode::BAD_REQUEST, fields),
            AccountError::PasswordHash(_) | AccountError::Task(_) | AccountError::Sqlx(_) => {
                AppError::internal(err)
            }
        }
    }
}
