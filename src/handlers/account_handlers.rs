//! Registration, login and profile endpoints under `/auth`.

use crate::{
    errors::AppError,
    middleware::auth::AuthUser,
    models::user::{RegisteredUser, UserProfile},
    services::account_service::{LoginRequest, RegisterRequest},
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let user = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(RegisteredUser::from(&user))))
}

/// `POST /auth/login`: returns the caller's API token.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    let (user, token) = state.accounts.login(payload).await?;
    Ok(Json(LoginResponse {
        token: token.key,
        email: user.email,
    }))
}

/// `GET /auth/profile`
pub async fn profile(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}
