//! Error types for the proxy endpoint, the client gateway and the upload flow.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use crate::schema::ProxyEnvelope;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error occurred while processing the file";

/// Failures of `POST /api/ocr`. Each one is scoped to a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Bad input from the caller (missing file, disallowed type, malformed body).
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },

    /// The OCR backend answered with a non-2xx status.
    #[error("OCR processing failed: {status} {status_text}")]
    Upstream { status: u16, status_text: String },

    /// The OCR backend could not be reached or its response could not be parsed.
    #[error("Internal server error occurred while processing the file: {details}")]
    Internal { details: String },
}

impl ProxyError {
    pub fn missing_file() -> Self {
        Self::Validation {
            message: "No file provided".to_string(),
            details: None,
        }
    }

    pub fn unsupported_media_type(media_type: &str) -> Self {
        Self::Validation {
            message: "Invalid file type. Please upload a PDF or image file.".to_string(),
            details: Some(format!("Received media type {:?}", media_type)),
        }
    }

    pub fn too_many_files() -> Self {
        Self::Validation {
            message: "Only one file may be uploaded per request".to_string(),
            details: None,
        }
    }

    pub fn malformed_multipart(details: impl Into<String>) -> Self {
        Self::Validation {
            message: "Malformed multipart body".to_string(),
            details: Some(details.into()),
        }
    }

    pub fn internal(details: impl ToString) -> Self {
        Self::Internal {
            details: details.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The JSON body sent to the client.
    pub fn envelope(&self) -> ProxyEnvelope {
        match self {
            Self::Validation { message, details } => {
                ProxyEnvelope::failure(message.clone(), details.clone())
            }
            Self::Upstream { .. } => ProxyEnvelope::failure(self.to_string(), None),
            Self::Internal { details } => {
                ProxyEnvelope::failure(INTERNAL_ERROR_MESSAGE, Some(details.clone()))
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            Self::Validation { .. } => tracing::debug!("Rejected upload: {}", self),
            Self::Upstream { .. } => tracing::warn!("OCR backend error: {}", self),
            Self::Internal { .. } => tracing::error!("Proxy failure: {}", self),
        }

        (self.status_code(), Json(self.envelope())).into_response()
    }
}

/// Failures seen by the client gateway. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request to OCR endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from OCR endpoint: {0}")]
    Decode(#[from] serde_json::Error),

    /// The endpoint answered but reported a failure.
    #[error("{message}")]
    Rejected { message: String },
}

/// Illegal transitions of the upload flow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("A file is already being processed")]
    AlreadyProcessing,

    #[error("Unsupported file type {media_type:?}")]
    UnsupportedMediaType { media_type: String },
}
