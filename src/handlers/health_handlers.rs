//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and blob storage I/O

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

const PROBE_CONTENT: &[u8] = b"readyz";

/// `GET /healthz`
///
/// Liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs `SELECT 1` against SQLite.
/// 2. Writes, reads back and deletes a probe entry through the blob store.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.gallery.db)
        .await
    {
        Ok(1) => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let blobs = &state.gallery.blobs;
    let probe_key = format!(".readyz-{}", Uuid::new_v4());
    let storage_check = match blobs
        .write(&probe_key, Bytes::from_static(PROBE_CONTENT))
        .await
    {
        Ok(()) => {
            let read_back = blobs.read(&probe_key).await;
            let removed = blobs.delete(&probe_key).await;
            match (read_back, removed) {
                (Ok(bytes), Ok(())) if bytes.as_ref() == PROBE_CONTENT => (true, None),
                (Ok(bytes), Err(e)) if bytes.as_ref() == PROBE_CONTENT => {
                    (true, Some(format!("could not remove probe: {}", e)))
                }
                (Ok(_), _) => (false, Some("probe content mismatch".to_string())),
                (Err(e), _) => (false, Some(format!("could not read probe: {}", e))),
            }
        }
        Err(e) => (false, Some(format!("could not write probe: {}", e))),
    };

    let overall_ok = sqlite_check.0 && storage_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_check.0,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "storage",
        CheckStatus {
            ok: storage_check.0,
            error: storage_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
