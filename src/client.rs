//! Client side of `POST /api/ocr`.
//!
//! [`OcrGateway::submit_for_display`] unwraps the envelope into a result or an
//! error; [`OcrGateway::submit_raw`] hands back the envelope as received. Both
//! go through the same single upload call.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, error};

use crate::error::GatewayError;
use crate::schema::{OcrResponse, ProxyEnvelope};
use crate::upload::UploadCandidate;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/ocr";

/// What the endpoint answered, before any interpretation.
struct RawReply {
    status: StatusCode,
    body: Vec<u8>,
}

#[derive(Clone)]
pub struct OcrGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl OcrGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload a file and return the unwrapped OCR result.
    pub async fn submit_for_display(
        &self,
        candidate: &UploadCandidate,
    ) -> Result<OcrResponse, GatewayError> {
        let result = self
            .send(candidate)
            .await
            .and_then(|reply| unwrap_for_display(reply.status, &reply.body));

        if let Err(e) = &result {
            error!("Error processing {} with OCR: {}", candidate.name(), e);
        }
        result
    }

    /// Upload a file and return the envelope whatever the HTTP status.
    pub async fn submit_raw(
        &self,
        candidate: &UploadCandidate,
    ) -> Result<ProxyEnvelope, GatewayError> {
        let result = self.send(candidate).await.and_then(|reply| {
            serde_json::from_slice::<ProxyEnvelope>(&reply.body).map_err(GatewayError::from)
        });

        if let Err(e) = &result {
            error!("Error processing {} with OCR API: {}", candidate.name(), e);
        }
        result
    }

    async fn send(&self, candidate: &UploadCandidate) -> Result<RawReply, GatewayError> {
        let part = Part::bytes(candidate.data().to_vec())
            .file_name(candidate.name().to_string())
            .mime_str(candidate.media_type())?;
        let form = Form::new().part("file", part);

        debug!(
            "Uploading {} ({} bytes) to {}",
            candidate.name(),
            candidate.size(),
            self.endpoint
        );

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        debug!("OCR endpoint answered {} ({} bytes)", status, body.len());
        Ok(RawReply { status, body })
    }
}

fn unwrap_for_display(status: StatusCode, body: &[u8]) -> Result<OcrResponse, GatewayError> {
    if !status.is_success() {
        let reported = serde_json::from_slice::<ProxyEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error);
        let message = reported.unwrap_or_else(|| {
            format!(
                "API request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
        });
        return Err(GatewayError::Rejected { message });
    }

    let envelope: ProxyEnvelope = serde_json::from_slice(body)?;
    if !envelope.is_success() {
        return Err(GatewayError::Rejected {
            message: envelope
                .error
                .unwrap_or_else(|| "OCR processing failed".to_string()),
        });
    }

    envelope.data.ok_or_else(|| GatewayError::Rejected {
        message: "OCR endpoint reported success without data".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate() -> UploadCandidate {
        UploadCandidate::new("doc.pdf", "application/pdf", b"%PDF".to_vec())
    }

    fn success_body() -> serde_json::Value {
        json!({
            "success": true,
            "data": {"backend": "x", "version": "1.0", "results": {"doc.pdf": {"md_content": "# Hi"}}},
            "filename": "doc.pdf",
            "fileSize": 4,
            "processedAt": "2025-02-05T12:00:00.000Z"
        })
    }

    async fn gateway_answering(template: ResponseTemplate) -> (MockServer, OcrGateway) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ocr"))
            .and(body_string_contains("name=\"file\"; filename=\"doc.pdf\""))
            .respond_with(template)
            .expect(1)
            .mount(&mock_server)
            .await;
        let gateway = OcrGateway::new(format!("{}/api/ocr", mock_server.uri()));
        (mock_server, gateway)
    }

    #[tokio::test]
    async fn test_display_unwraps_success() {
        let (_server, gateway) =
            gateway_answering(ResponseTemplate::new(200).set_body_json(success_body())).await;

        let result = gateway.submit_for_display(&candidate()).await.unwrap();
        assert_eq!(result.backend, "x");
        assert_eq!(result.results["doc.pdf"].md_content, "# Hi");
    }

    #[tokio::test]
    async fn test_display_surfaces_endpoint_error_message() {
        let (_server, gateway) = gateway_answering(
            ResponseTemplate::new(400).set_body_json(json!({"error": "No file provided"})),
        )
        .await;

        let err = gateway.submit_for_display(&candidate()).await.unwrap_err();
        assert_eq!(err.to_string(), "No file provided");
    }

    #[tokio::test]
    async fn test_display_falls_back_to_status_message() {
        let (_server, gateway) =
            gateway_answering(ResponseTemplate::new(502).set_body_string("upstream down")).await;

        let err = gateway.submit_for_display(&candidate()).await.unwrap_err();
        assert_eq!(err.to_string(), "API request failed: 502 Bad Gateway");
    }

    #[tokio::test]
    async fn test_display_rejects_unsuccessful_envelope() {
        let (_server, gateway) = gateway_answering(
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "quota"})),
        )
        .await;

        let err = gateway.submit_for_display(&candidate()).await.unwrap_err();
        assert_eq!(err.to_string(), "quota");
    }

    #[tokio::test]
    async fn test_display_generic_message_without_error_field() {
        let (_server, gateway) =
            gateway_answering(ResponseTemplate::new(200).set_body_json(json!({}))).await;

        let err = gateway.submit_for_display(&candidate()).await.unwrap_err();
        assert_eq!(err.to_string(), "OCR processing failed");
    }

    #[tokio::test]
    async fn test_raw_returns_failure_envelope_unchanged() {
        let body = json!({
            "error": "Internal server error occurred while processing the file",
            "details": "timeout"
        });
        let (_server, gateway) =
            gateway_answering(ResponseTemplate::new(500).set_body_json(body.clone())).await;

        let envelope = gateway.submit_raw(&candidate()).await.unwrap();
        assert!(!envelope.is_success());
        assert_eq!(serde_json::to_value(&envelope).unwrap(), body);
    }

    #[tokio::test]
    async fn test_raw_returns_success_envelope() {
        let (_server, gateway) =
            gateway_answering(ResponseTemplate::new(200).set_body_json(success_body())).await;

        let envelope = gateway.submit_raw(&candidate()).await.unwrap();
        assert_eq!(serde_json::to_value(&envelope).unwrap(), success_body());
    }

    #[tokio::test]
    async fn test_raw_reraises_undecodable_body() {
        let (_server, gateway) =
            gateway_answering(ResponseTemplate::new(200).set_body_string("not json")).await;

        let err = gateway.submit_raw(&candidate()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }
}
