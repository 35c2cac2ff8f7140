//! AccountService: registration, password login, token authentication.

use crate::models::user::{AuthToken, User};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Field name -> list of messages, as returned to clients on validation failure.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("no user registered with email `{0}`")]
    UnknownEmail(String),
    #[error("incorrect password")]
    WrongPassword,
    #[error("authentication credentials were not provided")]
    MissingCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid registration: {0:?}")]
    Validation(FieldErrors),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AccountResult<T> = Result<T, AccountError>;

/// Body of `POST /auth/register`.
#[derive(Debug, Deserialize, Default)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, first_name, last_name, is_staff, date_joined";

#[derive(Clone)]
pub struct AccountService {
    pub db: Arc<SqlitePool>,
}

impl AccountService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Validate and create a new user.
    ///
    /// Every field problem is collected before returning, so a request with
    /// both a taken email and a taken username reports both.
    pub async fn register(&self, req: RegisterRequest) -> AccountResult<User> {
        let mut errors = FieldErrors::new();
        let email = required(&mut errors, "email", req.email.as_deref());
        let username = required(&mut errors, "username", req.username.as_deref());
        let password = required(&mut errors, "password", req.password.as_deref());

        if let Some(email) = email {
            if !looks_like_email(email) {
                push(&mut errors, "email", "Enter a valid email address.");
            } else if self.find_by_email(email).await?.is_some() {
                push(&mut errors, "email", "This field must be unique.");
            }
        }
        if let Some(username) = username {
            if self.find_by_username(username).await?.is_some() {
                push(
                    &mut errors,
                    "username",
                    "A user with that username already exists.",
                );
            }
        }
        if let (Some(password), Some(confirm)) = (password, req.password2.as_deref()) {
            if password != confirm {
                push(&mut errors, "password", "Password fields didn't match.");
            }
        }

        let (Some(email), Some(username), Some(password)) = (email, username, password) else {
            return Err(AccountError::Validation(errors));
        };
        if !errors.is_empty() {
            return Err(AccountError::Validation(errors));
        }

        let password_hash = hash_password(password.to_string()).await?;
        let inserted = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, password_hash, first_name, last_name, is_staff, date_joined)
             VALUES (?, ?, ?, ?, ?, 0, ?)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(username)
        .bind(&password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(user) => {
                info!("registered user {} ({})", user.id, user.email);
                Ok(user)
            }
            Err(err) if is_unique_violation(&err) => {
                // Lost a race against a concurrent registration.
                let field = if err.to_string().contains("users.email") {
                    ("email", "This field must be unique.")
                } else {
                    ("username", "A user with that username already exists.")
                };
                let mut errors = FieldErrors::new();
                push(&mut errors, field.0, field.1);
                Err(AccountError::Validation(errors))
            }
            Err(err) => Err(AccountError::Sqlx(err)),
        }
    }

    /// Check credentials and return the user's token, creating it on first login.
    pub async fn login(&self, req: LoginRequest) -> AccountResult<(User, AuthToken)> {
        let mut errors = FieldErrors::new();
        let email = required(&mut errors, "email", req.email.as_deref());
        let password = required(&mut errors, "password", req.password.as_deref());
        let (Some(email), Some(password)) = (email, password) else {
            return Err(AccountError::Validation(errors));
        };

        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AccountError::UnknownEmail(email.to_string()))?;

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            return Err(AccountError::WrongPassword);
        }

        let token = self.get_or_create_token(user.id).await?;
        Ok((user, token))
    }

    /// Resolve an `Authorization` header value to its user.
    pub async fn authenticate(&self, header: Option<&str>) -> AccountResult<User> {
        let header = header.ok_or(AccountError::MissingCredentials)?;
        let key = header
            .strip_prefix("Token ")
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AccountError::MissingCredentials)?;

        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users
             WHERE id = (SELECT user_id FROM auth_tokens WHERE key = ?)",
            USER_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(AccountError::InvalidToken)
    }

    /// Grant staff rights to an existing user.
    pub async fn promote_admin(&self, email: &str) -> AccountResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_staff = 1 WHERE email = ? RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| AccountError::UnknownEmail(email.to_string()))?;

        info!("user {} ({}) promoted to staff", user.id, user.email);
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> AccountResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn find_by_username(&self, username: &str) -> AccountResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn get_or_create_token(&self, user_id: i64) -> AccountResult<AuthToken> {
        sqlx::query(
            "INSERT INTO auth_tokens (key, user_id, created) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(user_id)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        Ok(sqlx::query_as::<_, AuthToken>(
            "SELECT key, user_id, created FROM auth_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?)
    }
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        None => {
            push(errors, field, "This field is required.");
            None
        }
        Some(v) if v.trim().is_empty() => {
            push(errors, field, "This field may not be blank.");
            None
        }
        Some(v) => Some(v),
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Argon2id hash as a PHC string. Runs on the blocking pool.
async fn hash_password(password: String) -> AccountResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AccountError::PasswordHash(err.to_string()))
    })
    .await?
}

async fn verify_password(password: String, stored: String) -> AccountResult<bool> {
    let matches = tokio::task::spawn_blocking(move || {
        PasswordHash::new(&stored)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await?;
    Ok(matches)
}

/// Return true if SQLx error indicates a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
