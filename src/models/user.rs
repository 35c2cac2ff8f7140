//! Registered users and their API tokens.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// An account that owns albums.
///
/// `email` and `username` are each unique across the whole system. The
/// password is only ever held as an Argon2 PHC string.
#[derive(Clone, FromRow, Debug)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Staff users may run administrative operations such as deleting every album.
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// Opaque bearer token issued on login. One per user.
#[derive(Clone, FromRow, Debug)]
pub struct AuthToken {
    pub key: String,
    pub user_id: i64,
    pub created: DateTime<Utc>,
}

/// Body returned by a successful registration.
#[derive(Serialize, Debug)]
pub struct RegisteredUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for RegisteredUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Body returned by `GET /auth/profile`.
#[derive(Serialize, Debug)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            date_joined: user.date_joined,
        }
    }
}
