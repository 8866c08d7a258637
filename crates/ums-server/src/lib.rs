// crates/ums-server/src/lib.rs
// ============================================================================
// Module: UMS HTTP Server
// Description: Axum shell exposing the operation API over local HTTP.
// Purpose: Serialize HTTP callers through one single-writer engine mutex.
// Dependencies: axum, serde_json, thiserror, tokio, ums-core
// ============================================================================

//! ## Overview
//! The server exposes `POST /v1/operations/{name}` plus
//! `GET /v1/health`. Requests without a `storeId` inherit it from the
//! `x-ums-store` header. A single mutex over the engine serializes
//! operations; after each committed mutation the snapshot is saved to
//! the configured store, so a restart resumes from the last operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use ums_core::MemoryEngine;
use ums_core::SnapshotStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the default store for a request.
pub const STORE_HEADER: &str = "x-ums-store";

// ============================================================================
// SECTION: Server Errors
// ============================================================================

/// Server bootstrap errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not bind.
    #[error("bind failed: {0}")]
    Bind(String),
    /// Serving loop failed.
    #[error("serve failed: {0}")]
    Serve(String),
    /// Snapshot store failed during bootstrap.
    #[error("snapshot store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Shared server state: the engine mutex and optional persistence.
#[derive(Clone)]
pub struct ServerState {
    /// Single-writer engine.
    engine: Arc<Mutex<MemoryEngine>>,
    /// Snapshot persistence saved after each mutation.
    store: Option<Arc<dyn SnapshotStore + Send + Sync>>,
}

impl ServerState {
    /// Creates server state over an engine without persistence.
    #[must_use]
    pub fn new(engine: MemoryEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            store: None,
        }
    }

    /// Creates server state with snapshot persistence.
    #[must_use]
    pub fn with_store(
        engine: MemoryEngine,
        store: Arc<dyn SnapshotStore + Send + Sync>,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            store: Some(store),
        }
    }
}

// ============================================================================
// SECTION: Request Helpers
// ============================================================================

/// Injects the `x-ums-store` header value as `storeId` when the body
/// omits one. Non-object bodies pass through untouched; the engine
/// rejects them with its own validation error.
#[must_use]
pub fn inject_store_header(mut body: Value, headers: &HeaderMap) -> Value {
    let Some(raw) = headers.get(STORE_HEADER).and_then(|value| value.to_str().ok()) else {
        return body;
    };
    if let Some(fields) = body.as_object_mut()
        && !fields.contains_key("storeId")
    {
        fields.insert("storeId".to_string(), Value::String(raw.to_string()));
    }
    body
}

/// Maps a taxonomy code onto an HTTP status.
#[must_use]
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "CONFLICT" => StatusCode::CONFLICT,
        "CONTRACT_VIOLATION" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Executes one operation under the engine mutex.
async fn operation_handler(
    State(state): State<ServerState>,
    Path(operation): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let request = inject_store_header(body, &headers);

    let Ok(mut engine) = state.engine.lock() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ok": false,
                "error": {
                    "code": "CONTRACT_VIOLATION",
                    "message": "engine mutex poisoned",
                    "details": Value::Null,
                },
            })),
        );
    };

    let envelope = engine.execute_envelope(&operation, &request);
    if envelope.get("ok") == Some(&Value::Bool(false)) {
        let code = envelope["error"]["code"].as_str().unwrap_or("VALIDATION_FAILED");
        return (status_for_code(code), Json(envelope.clone()));
    }

    // Persist after every committed mutation so restarts resume from
    // the last operation.
    if let Some(store) = &state.store
        && envelope.get("action").and_then(Value::as_str) != Some("noop")
        && let Ok(snapshot) = engine.snapshot_export()
        && let Err(err) = store.save(&snapshot)
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ok": false,
                "error": {
                    "code": "CONTRACT_VIOLATION",
                    "message": format!("snapshot save failed: {err}"),
                    "details": Value::Null,
                },
            })),
        );
    }

    (StatusCode::OK, Json(envelope))
}

/// Reports liveness plus store readiness.
async fn health_handler(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    let store_ready = state
        .store
        .as_ref()
        .map_or(true, |store| store.readiness().is_ok());
    if store_ready {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded" })),
        )
    }
}

// ============================================================================
// SECTION: Router and Serve
// ============================================================================

/// Builds the operation router over shared state.
#[must_use]
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/v1/operations/{operation}", post(operation_handler))
        .route("/v1/health", get(health_handler))
        .with_state(state)
}

/// Binds the listener and serves until the task is cancelled.
///
/// # Errors
///
/// Returns [`ServerError`] when binding or serving fails.
pub async fn serve(state: ServerState, addr: SocketAddr) -> Result<(), ServerError> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::Bind(format!("{addr}: {err}")))?;
    axum::serve(listener, router)
        .await
        .map_err(|err| ServerError::Serve(err.to_string()))
}
