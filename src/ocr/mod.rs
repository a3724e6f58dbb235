//! OCR backend abstraction.
//!
//! The proxy endpoint talks to the upstream service only through
//! [`OcrBackend`], so handlers can be exercised against an in-process stub.

pub mod file_parse;

use crate::error::ProxyError;
use crate::schema::OcrResponse;

/// A validated upload received by the proxy, ready to forward.
#[derive(Debug, Clone)]
pub struct ForwardedFile {
    pub filename: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl ForwardedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Submit one file and return the parsed backend response.
    ///
    /// Implementations do not retry.
    async fn parse(&self, file: &ForwardedFile) -> Result<OcrResponse, ProxyError>;
}
