//! Proxy configuration.
//!
//! Runtime settings come from the environment (a `.env` file is loaded first).
//! The parameter set forwarded to the OCR backend is fixed policy and lives in
//! [`FileParseParams`].

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "https://ocr_backend.futurixai.com/file_parse";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024; // 100MB

/// Settings for `ocr-relay serve`.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub backend_url: String,
    /// Upstream request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            timeout: None,
            bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind address is valid"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ProxyConfig {
    /// Read `OCR_BACKEND_URL`, `OCR_TIMEOUT_SECS`, `BIND_ADDR` and `MAX_UPLOAD_BYTES`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("OCR_BACKEND_URL") {
            config.backend_url = url;
        }

        if let Some(secs) = lookup("OCR_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("OCR_TIMEOUT_SECS is not a number: {:?}", secs))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("BIND_ADDR is not a socket address: {:?}", addr))?;
        }

        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {:?}", limit))?;
        }

        Ok(config)
    }
}

/// Processing parameters attached to every forwarded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParseParams {
    pub return_middle_json: bool,
    pub return_model_output: bool,
    pub return_md: bool,
    pub return_images: bool,
    pub start_page_id: u32,
    pub end_page_id: u32,
    pub parse_method: String,
    pub lang_list: String,
    pub output_dir: String,
    pub server_url: String,
    pub return_content_list: bool,
    pub backend: String,
    pub table_enable: bool,
    pub formula_enable: bool,
    pub response_format_zip: bool,
}

impl Default for FileParseParams {
    fn default() -> Self {
        Self {
            return_middle_json: false,
            return_model_output: false,
            return_md: true,
            return_images: true,
            start_page_id: 0,
            end_page_id: 99999,
            parse_method: "auto".to_string(),
            lang_list: "en".to_string(),
            output_dir: "./output".to_string(),
            server_url: "string".to_string(),
            return_content_list: false,
            backend: "vlm-vllm-async-engine".to_string(),
            table_enable: true,
            formula_enable: true,
            response_format_zip: false,
        }
    }
}

impl FileParseParams {
    /// Form fields in the order the backend documents them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("return_middle_json", self.return_middle_json.to_string()),
            ("return_model_output", self.return_model_output.to_string()),
            ("return_md", self.return_md.to_string()),
            ("return_images", self.return_images.to_string()),
            ("end_page_id", self.end_page_id.to_string()),
            ("parse_method", self.parse_method.clone()),
            ("start_page_id", self.start_page_id.to_string()),
            ("lang_list", self.lang_list.clone()),
            ("output_dir", self.output_dir.clone()),
            ("server_url", self.server_url.clone()),
            ("return_content_list", self.return_content_list.to_string()),
            ("backend", self.backend.clone()),
            ("table_enable", self.table_enable.to_string()),
            ("response_format_zip", self.response_format_zip.to_string()),
            ("formula_enable", self.formula_enable.to_string()),
        ]
    }
}
