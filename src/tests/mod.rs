//! HTTP-level tests. Each test gets its own in-memory database and an
//! in-memory blob store, and drives the real router.

use crate::{
    db,
    models::user::User,
    routes::routes::routes,
    services::blob_store::MemoryBlobStore,
    state::AppState,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::Cursor, str::FromStr, sync::Arc};
use tower::ServiceExt;

mod account_handler_tests;

pub const BOUNDARY: &str = "gallery-test-boundary";

pub enum TestBody {
    Empty,
    Json(Value),
    /// `(filename, bytes)` per file part.
    Files(Vec<(String, Vec<u8>)>),
    /// Bytes sent as-is, with an optional content type.
    Raw(Option<String>, Vec<u8>),
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        // a single, never-recycled connection keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();

        let blobs = Arc::new(MemoryBlobStore::new());
        let state = AppState::new(Arc::new(pool), blobs.clone());
        let router = routes(8 * 1024 * 1024).with_state(state.clone());

        Self {
            router,
            state,
            blobs,
        }
    }

    /// Insert a user with a token, skipping password hashing.
    pub async fn create_user(&self, email: &str, username: &str, is_staff: bool) -> (User, String) {
        let db = &*self.state.accounts.db;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, username, password_hash, first_name, last_name, is_staff, date_joined)
             VALUES (?, ?, '!', '', '', ?, ?)
             RETURNING id, email, username, password_hash, first_name, last_name, is_staff, date_joined",
        )
        .bind(email)
        .bind(username)
        .bind(is_staff)
        .bind(Utc::now())
        .fetch_one(db)
        .await
        .unwrap();

        let token = format!("token-{}", username);
        sqlx::query("INSERT INTO auth_tokens (key, user_id, created) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user.id)
            .bind(Utc::now())
            .execute(db)
            .await
            .unwrap();

        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: TestBody,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let request = match body {
            TestBody::Empty => builder.body(Body::empty()),
            TestBody::Json(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string())),
            TestBody::Files(files) => builder
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(&files))),
            TestBody::Raw(content_type, bytes) => match content_type {
                Some(content_type) => builder.header(header::CONTENT_TYPE, content_type),
                None => builder,
            }
            .body(Body::from(bytes)),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), TestBody::Empty)
            .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), TestBody::Empty)
            .await
    }

    pub async fn create_album(&self, token: &str, name: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/album/",
            Some(token),
            TestBody::Json(serde_json::json!({ "name": name })),
        )
        .await
    }

    pub async fn upload(
        &self,
        token: &str,
        album_segment: &str,
        files: Vec<(String, Vec<u8>)>,
    ) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            &format!("/album/{}", album_segment),
            Some(token),
            TestBody::Files(files),
        )
        .await
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&*self.state.gallery.db)
            .await
            .unwrap()
    }
}

/// A 100x100 red PNG.
pub fn png_bytes() -> Vec<u8> {
    let image = RgbaImage::from_pixel(100, 100, Rgba([155, 0, 0, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn png_file(name: &str) -> (String, Vec<u8>) {
    (name.to_string(), png_bytes())
}

fn multipart_body(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, (name, bytes)) in files.iter().enumerate() {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, i, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[tokio::test]
async fn health_and_readiness() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/healthz", None, TestBody::Empty)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app
        .request(Method::GET, "/readyz", None, TestBody::Empty)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["storage"]["ok"], true);
    assert!(app.blobs.keys().await.is_empty());
}
