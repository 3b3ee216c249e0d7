use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use log::info;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};

use crate::blob_store::{extension_for_upload, StagedBlob};
use crate::config::ServerConfig;
use crate::constants::MAX_UPLOAD_BYTES;
use crate::error::AppError;
use crate::service::SessionService;
use crate::session::UploadMetadata;

/// Shared state for the API handlers
pub struct AppState {
    pub service: SessionService,
}

/// Build the HTTP surface over an already-opened service.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/upload", post(upload_handler))
        .route("/api/sessions", get(sessions_handler))
        .route("/api/sessions/{session_id}", delete(delete_handler))
        .route("/api/video/{session_id}", get(video_handler))
        .route("/api/health", get(health_handler))
        .route("/api/status", get(status_handler))
        // Multipart framing adds a little on top of the video ceiling; the
        // blob writer enforces the real per-file limit.
        .layer(DefaultBodyLimit::max((MAX_UPLOAD_BYTES as usize) + 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

/// Open the configured stores and serve the API until ctrl-c.
pub async fn run_server(config: ServerConfig) -> Result<(), AppError> {
    let service = SessionService::open(&config).await?;

    println!("Data directory: {}", config.data_dir.display());
    println!("Record store: {}", service.backend_name());
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", config.port);
    println!("Endpoints:");
    println!("  POST   /api/upload  - Upload a recorded session (multipart)");
    println!("  GET    /api/sessions  - List stored sessions");
    println!("  GET    /api/video/:session_id  - Stream a session video");
    println!("  DELETE /api/sessions/:session_id  - Delete a session");
    println!("  GET    /api/health  - Health check");
    println!("  GET    /api/status  - Operational snapshot");

    let state = Arc::new(AppState { service });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", config.port))
        .await
        .map_err(|e| AppError::Storage(format!("Failed to bind to port {}: {}", config.port, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Storage(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        println!("\nShutting down");
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    session_id: String,
    message: &'static str,
}

/// POST /api/upload - multipart form with a `video` part plus metadata text
/// fields. Streams the video part to a staging file as it arrives, then
/// validates and commits once the whole form has been read (the video part
/// may precede the metadata fields).
async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut metadata = UploadMetadata::default();
    let mut staged: Option<(StagedBlob, String)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if let Some((blob, _)) = staged.take() {
                    state.service.blobs().discard(blob).await;
                }
                return Err(AppError::Validation(format!(
                    "Malformed multipart request: {}",
                    e
                )));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let extension = extension_for_upload(field.file_name(), field.content_type());
                let blob = stream_video_field(&state, field).await?;
                // A repeated video part replaces the earlier one.
                if let Some((previous, _)) = staged.replace((blob, extension)) {
                    state.service.blobs().discard(previous).await;
                }
            }
            "sessionId" => metadata.session_id = Some(text_field(field).await?),
            "patientId" => metadata.patient_id = text_field(field).await?,
            "assessment" => metadata.assessment = text_field(field).await?,
            "startTime" => metadata.start_time = text_field(field).await?,
            "endTime" => metadata.end_time = text_field(field).await?,
            "durationMs" => {
                metadata.duration_ms = text_field(field).await?.trim().parse().unwrap_or(0)
            }
            _ => {}
        }
    }

    let Some((blob, extension)) = staged else {
        return Err(AppError::Validation("No video file uploaded".to_string()));
    };

    let prepared = match state.service.prepare_upload(metadata) {
        Ok(prepared) => prepared,
        Err(e) => {
            state.service.blobs().discard(blob).await;
            return Err(e);
        }
    };

    let stored = state
        .service
        .blobs()
        .promote(blob, &prepared.id, &extension)
        .await?;
    let session_id = state.service.commit_upload(prepared, stored).await?;

    info!("stored session {}", session_id);
    Ok(Json(UploadResponse {
        success: true,
        session_id,
        message: "Video uploaded successfully",
    }))
}

/// Stream one multipart video part into a staging file.
async fn stream_video_field(
    state: &Arc<AppState>,
    mut field: Field<'_>,
) -> Result<StagedBlob, AppError> {
    let mut writer = state.service.blobs().stage().await?;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => writer.append(&chunk).await?,
            Ok(None) => break,
            Err(e) => {
                writer.abort().await;
                return Err(AppError::Validation(format!(
                    "Failed to read video part: {}",
                    e
                )));
            }
        }
    }
    writer.finish().await
}

async fn text_field(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form field: {}", e)))
}

/// GET /api/sessions - public projections, newest first
async fn sessions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<crate::session::PublicSession>>, AppError> {
    Ok(Json(state.service.list().await?))
}

/// GET /api/video/:session_id - stream the stored blob
async fn video_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Response, AppError> {
    let video = state.service.fetch_video(&session_id).await?;
    let body = Body::from_stream(ReaderStream::new(video.file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, video.content_type)
        .header(header::CONTENT_LENGTH, video.size)
        .body(body)
        .map_err(|e| AppError::Storage(format!("failed to build video response: {}", e)))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    message: &'static str,
}

/// DELETE /api/sessions/:session_id - remove record and blob
async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.service.delete(&session_id).await?;
    info!("deleted session {}", session_id);
    Ok(Json(DeleteResponse {
        success: true,
        message: "Session deleted successfully",
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

/// GET /api/health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
    server_time: String,
    total_sessions: i64,
    storage_backend: &'static str,
    message: &'static str,
}

/// GET /api/status - operational snapshot so multiple devices can verify
/// they talk to the same server
async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, AppError> {
    let total_sessions = state.service.count().await?;
    Ok(Json(StatusResponse {
        status: "ok",
        server_time: Utc::now().to_rfc3339(),
        total_sessions,
        storage_backend: state.service.backend_name(),
        message: "All devices connected to this server share the same session store",
    }))
}
