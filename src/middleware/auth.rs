//! Token authentication for handlers.
//!
//! Clients send `Authorization: Token <key>`, using the key returned by
//! `POST /auth/login`.

use crate::{errors::AppError, models::user::User, state::AppState};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// The authenticated caller. Rejects the request with 401 when the token is
/// missing or unknown.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let user = state.accounts.authenticate(header).await?;
        Ok(AuthUser(user))
    }
}
