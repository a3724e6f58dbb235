//! Client for the remote `file_parse` OCR service.

use super::{ForwardedFile, OcrBackend};
use crate::config::{FileParseParams, ProxyConfig};
use crate::error::ProxyError;
use crate::schema::OcrResponse;
use anyhow::Context;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

pub struct FileParseBackend {
    url: String,
    params: FileParseParams,
    client: reqwest::Client,
}

impl FileParseBackend {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            params: FileParseParams::default(),
            client,
        }
    }

    /// Build the backend from proxy settings, applying the optional timeout.
    pub fn from_config(config: &ProxyConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self::new(config.backend_url.clone(), client))
    }

    fn build_form(&self, file: &ForwardedFile) -> Result<Form, ProxyError> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.media_type)
            .map_err(ProxyError::internal)?;

        let form = self
            .params
            .form_fields()
            .into_iter()
            .fold(Form::new().part("files", part), |form, (name, value)| {
                form.text(name, value)
            });

        Ok(form)
    }
}

#[async_trait::async_trait]
impl OcrBackend for FileParseBackend {
    fn name(&self) -> &str {
        "file_parse"
    }

    async fn parse(&self, file: &ForwardedFile) -> Result<OcrResponse, ProxyError> {
        let form = self.build_form(file)?;

        info!(
            "FileParseBackend: forwarding {} ({} bytes, {}) to {}",
            file.filename,
            file.size(),
            file.media_type,
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .header("accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(ProxyError::internal)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let raw_text = response.text().await.map_err(ProxyError::internal)?;
        debug!(
            "FileParseBackend: raw response ({} bytes): {}",
            raw_text.len(),
            raw_text.chars().take(500).collect::<String>()
        );

        let parsed: OcrResponse = serde_json::from_str(&raw_text).map_err(ProxyError::internal)?;
        parsed.validate().map_err(ProxyError::internal)?;

        info!(
            "FileParseBackend: {} result(s) from backend {} v{}",
            parsed.results.len(),
            parsed.backend,
            parsed.version
        );

        Ok(parsed)
    }
}
