//! Wire types shared by the proxy endpoint and the client gateway.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ISO8601 UTC timestamp with millisecond precision, e.g. `2025-02-05T12:00:00.000Z`.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Response body of the external OCR backend.
///
/// `results` is keyed by backend-assigned filenames, so it stays a map.
/// Fields this crate does not interpret are kept in `extra` and echoed back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    pub backend: String,
    pub version: String,
    pub results: BTreeMap<String, FileResult>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-file entry of [`OcrResponse::results`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub md_content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileResult {
    #[cfg(test)]
    pub fn new(md_content: impl Into<String>) -> Self {
        Self {
            md_content: md_content.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl OcrResponse {
    /// Check invariants serde cannot express: every results key is non-empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.results.keys().any(|k| k.is_empty()) {
            return Err("OCR backend returned a result with an empty filename".to_string());
        }
        Ok(())
    }
}

/// Uniform success/failure wrapper returned by `POST /api/ocr`.
///
/// Success: `success`, `data`, `filename`, `fileSize`, `processedAt`.
/// Failure: `error` and optionally `details`; `success` is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<OcrResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProxyEnvelope {
    /// Wrap a backend result, stamping `processedAt` now.
    pub fn success(data: OcrResponse, filename: impl Into<String>, file_size: u64) -> Self {
        Self {
            success: Some(true),
            data: Some(data),
            filename: Some(filename.into()),
            file_size: Some(file_size),
            processed_at: Some(now_iso8601()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: Some(error.into()),
            details,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_backend_json() -> serde_json::Value {
        json!({
            "backend": "x",
            "version": "1.0",
            "results": {"doc.pdf": {"md_content": "# Hi"}}
        })
    }

    #[test]
    fn test_parse_backend_response() {
        let parsed: OcrResponse = serde_json::from_value(sample_backend_json()).unwrap();
        assert_eq!(parsed.backend, "x");
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.results["doc.pdf"].md_content, "# Hi");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let raw = json!({
            "backend": "vlm",
            "version": "2.1",
            "results": {
                "scan.png": {"md_content": "", "images": {"img_0.jpg": "data:..."}}
            },
            "trace_id": "abc"
        });
        let parsed: OcrResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_null_md_content_is_rejected() {
        let raw = json!({
            "backend": "x",
            "version": "1.0",
            "results": {"doc.pdf": {"md_content": null}}
        });
        assert!(serde_json::from_value::<OcrResponse>(raw).is_err());
    }

    #[test]
    fn test_empty_result_key_fails_validation() {
        let raw = json!({
            "backend": "x",
            "version": "1.0",
            "results": {"": {"md_content": "text"}}
        });
        let parsed: OcrResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_success_envelope_shape() {
        let data: OcrResponse = serde_json::from_value(sample_backend_json()).unwrap();
        let envelope = ProxyEnvelope::success(data, "doc.pdf", 1234);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"], sample_backend_json());
        assert_eq!(value["filename"], json!("doc.pdf"));
        assert_eq!(value["fileSize"], json!(1234));
        assert!(value["processedAt"].as_str().unwrap().ends_with('Z'));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failure_envelope_omits_success() {
        let value = serde_json::to_value(ProxyEnvelope::failure("No file provided", None)).unwrap();
        assert_eq!(value, json!({"error": "No file provided"}));
    }

    #[test]
    fn test_processed_at_is_rfc3339() {
        let stamp = now_iso8601();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
