//! `POST /api/ocr`: validate an upload and relay it to the OCR backend.

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ProxyError;
use crate::ocr::{ForwardedFile, OcrBackend};
use crate::schema::ProxyEnvelope;
use crate::validate;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn OcrBackend>,
}

impl AppState {
    pub fn new(backend: Arc<dyn OcrBackend>) -> Self {
        Self { backend }
    }
}

/// Build the router with CORS, tracing and the upload size limit applied.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    // CorsLayer answers every OPTIONS request itself, so it only wraps the
    // POST handler and preflight goes to `ocr_preflight`.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/ocr", post(ocr_upload).layer(cors).options(ocr_preflight))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// CORS preflight for clients that call the endpoint cross-origin.
async fn ocr_preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST, OPTIONS")),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type")),
        ],
    )
}

/// Accept a single uploaded file and forward it for OCR.
async fn ocr_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProxyEnvelope>, ProxyError> {
    // Non-multipart requests still get the JSON error body.
    let multipart =
        multipart.map_err(|rejection| ProxyError::malformed_multipart(rejection.body_text()))?;
    let file = read_single_file(multipart).await?;

    if !validate::is_allowed_media_type(&file.media_type) {
        return Err(ProxyError::unsupported_media_type(&file.media_type));
    }

    info!(
        "Received file: {} ({} bytes, {}) via {}",
        file.filename,
        file.size(),
        file.media_type,
        state.backend.name()
    );

    let data = state.backend.parse(&file).await?;

    info!("OCR complete for {}: {} result(s)", file.filename, data.results.len());
    let size = file.size();
    Ok(Json(ProxyEnvelope::success(data, file.filename, size)))
}

/// Pull the `file` field out of the multipart body. Other fields are ignored.
async fn read_single_file(mut multipart: Multipart) -> Result<ForwardedFile, ProxyError> {
    let mut file: Option<ForwardedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProxyError::malformed_multipart(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if file.is_some() {
            return Err(ProxyError::too_many_files());
        }

        let filename = field.file_name().unwrap_or("document").to_string();
        let media_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ProxyError::malformed_multipart(e.to_string()))?
            .to_vec();

        file = Some(ForwardedFile {
            filename,
            media_type,
            data,
        });
    }

    file.ok_or_else(ProxyError::missing_file)
}
