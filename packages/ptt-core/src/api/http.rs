//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the room registry or storage
//! sink for business logic. The WebSocket endpoint itself lives in [`super::ws`].

use std::io::Cursor;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::api::response::{api_error, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::PttError;
use crate::protocol_constants::{DOWNLOAD_README_NAME, SERVICE_ID};

// ─────────────────────────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    #[serde(default)]
    persistent: bool,
    #[serde(default)]
    enable_cloud_recording: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/v1/rooms", post(create_room))
        .route("/api/v1/rooms/{code}/join", post(join_room))
        .route("/api/v1/rooms/{code}/ttl", get(room_ttl))
        .route("/api/v1/rooms/{code}/cooldown", get(room_cooldown))
        .route("/api/v1/storage/{code}/download", get(download_room_storage))
        .route("/{code}", get(ws_handler))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe: "Is the process running?"
async fn health_check() -> impl IntoResponse {
    api_success(json!({ "status": "ok", "service": SERVICE_ID }))
}

/// Readiness probe: the registry is constructed and accepting connections
/// as soon as the process is up, so readiness mirrors liveness here.
async fn readiness_check() -> impl IntoResponse {
    api_success(json!({ "status": "ready" }))
}

async fn create_room(State(state): State<AppState>, body: Option<Json<CreateRoomRequest>>) -> Response {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    match state.registry.create_room(request.persistent, request.enable_cloud_recording) {
        Ok(info) => api_success(json!({
            "code": info.code,
            "persistent": info.persistent,
            "enableCloudRecording": info.enable_cloud_recording,
        })),
        Err(err) => err.into_response(),
    }
}

async fn join_room(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.registry.lookup(&code) {
        Ok(info) => api_success(json!({ "code": info.code })),
        Err(err) => err.into_response(),
    }
}

async fn room_ttl(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.registry.ttl_remaining(&code) {
        Some(ttl) => api_success(json!({ "ttlSeconds": ttl.as_secs() })),
        None => PttError::RoomNotFound(code).into_response(),
    }
}

async fn room_cooldown(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.registry.cooldown_remaining(&code) {
        Some(cooldown) => api_success(json!({ "cooldownSeconds": cooldown.as_secs() })),
        None => PttError::RoomNotFound(code).into_response(),
    }
}

/// Packages every file captured for a room into a single ZIP archive,
/// including a README if the room didn't produce one of its own.
async fn download_room_storage(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let files = state.storage.list(&code);
    if files.is_empty() {
        return api_error(StatusCode::NOT_FOUND, "no_recordings", "no recordings found for this room");
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let has_readme = files.iter().any(|(name, _)| name == DOWNLOAD_README_NAME);
    for (name, bytes) in &files {
        if writer.start_file(name, options).is_err() {
            continue;
        }
        let _ = std::io::Write::write_all(&mut writer, bytes);
    }
    if !has_readme && writer.start_file(DOWNLOAD_README_NAME, options).is_ok() {
        let readme = format!("Recordings captured in classroom PTT room {code}.\n");
        let _ = std::io::Write::write_all(&mut writer, readme.as_bytes());
    }
    let body = match writer.finish() {
        Ok(cursor) => cursor.into_inner(),
        Err(_) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, "zip_failed", "failed to package recordings"),
    };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{code}.zip\"")),
        ],
        body,
    )
        .into_response()
}
