//! HTTP server.
//!
//! Exposes upload, query, and clear over a small JSON API for a browser
//! front end. Routes answer with and without the trailing slash.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload/` | Multipart PDF upload; replaces the current corpus |
//! | `POST` | `/query/` | `{query, language}` → `{response, complete, mode, truncated}` |
//! | `POST` | `/clear/` | Drop the index and empty the upload directory |
//! | `GET`  | `/health` | Status, version, and whether an index is loaded |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "File notes.txt is not a PDF" } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413, an upload
//! over `[server].max_upload_bytes`), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::ingest::IngestError;
use crate::models::{Answer, Query, UploadedFile};
use crate::query::QueryError;
use crate::service::{Providers, QaService};
use crate::storage::ClearOutcome;

#[derive(Clone)]
struct AppState {
    service: Arc<QaService>,
    max_upload_bytes: usize,
}

/// Starts the server with providers built from `config`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_providers(config, Providers::from_config(config)?).await
}

/// Starts the server with caller-supplied providers.
///
/// Used by tests and embedders that bring their own generation or
/// translation backend.
pub async fn run_server_with_providers(config: &Config, providers: Providers) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        service: Arc::new(QaService::new(config, providers)),
        max_upload_bytes: config.server.max_upload_bytes,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload/", post(handle_upload))
        .route("/upload", post(handle_upload))
        .route("/query/", post(handle_query))
        .route("/query", post(handle_query))
        .route("/clear/", post(handle_clear))
        .route("/clear", post(handle_clear))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Body-limit overruns become 413 naming the limit; anything else is a
/// malformed body.
fn multipart_error(err: MultipartError, max_upload_bytes: usize, context: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "payload_too_large".to_string(),
            message: format!("Upload exceeds the limit of {} bytes", max_upload_bytes),
        }
    } else {
        bad_request(format!("{}: {}", context, err))
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        if err.is_client_error() {
            bad_request(err.to_string())
        } else {
            internal(err.to_string())
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        internal(err.to_string())
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ============ POST /upload/ ============

/// Every multipart field that carries a filename is treated as an upload.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, state.max_upload_bytes, "invalid multipart body"))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| {
                multipart_error(e, state.max_upload_bytes, &format!("failed to read {}", filename))
            })?;
        files.push(UploadedFile::new(filename, bytes.to_vec()));
    }

    tracing::info!(files = files.len(), "upload received");
    let report = state.service.ingest(files).await.map_err(|e| {
        tracing::warn!(error = %e, "upload rejected");
        AppError::from(e)
    })?;

    Ok(Json(MessageResponse {
        message: format!("Successfully processed {} files", report.files),
    }))
}

// ============ POST /query/ ============

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<Query>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(query) = payload.map_err(|e| bad_request(e.body_text()))?;
    let answer = state.service.answer(&query).await.map_err(|e| {
        tracing::warn!(error = %e, "query failed");
        AppError::from(e)
    })?;
    Ok(Json(answer))
}

// ============ POST /clear/ ============

async fn handle_clear(State(state): State<AppState>) -> Result<Json<MessageResponse>, AppError> {
    match state.service.clear().await {
        ClearOutcome::Cleared { .. } => Ok(Json(MessageResponse {
            message: "All data cleared successfully".to_string(),
        })),
        ClearOutcome::Failed { .. } => Err(internal("Failed to clear data")),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    index_loaded: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_loaded: state.service.index_loaded().await,
    })
}
