//! Upload/process state machine.
//!
//! ```text
//! Idle ──select──▶ FileSelected ──begin──▶ Processing ──complete──▶ Success | Failed
//!   ▲                   ▲                                              │
//!   └──── reset ────────┴──────────── select ──────────────────────────┘
//! ```
//!
//! Every state that needs a file carries it, so "processing without a file"
//! cannot be represented. A reset while processing abandons the outcome; the
//! request itself keeps running and its completion is discarded.

use tracing::{debug, info, warn};

use crate::client::OcrGateway;
use crate::error::FlowError;
use crate::schema::OcrResponse;
use crate::upload::UploadCandidate;

/// Fallback shown when a failure carries no message.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing the file";

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    FileSelected {
        file: UploadCandidate,
    },
    Processing {
        file: UploadCandidate,
    },
    Success {
        file: UploadCandidate,
        result: OcrResponse,
    },
    Failed {
        file: UploadCandidate,
        error: String,
    },
}

impl FlowState {
    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::FileSelected { .. } => "file selected",
            FlowState::Processing { .. } => "processing",
            FlowState::Success { .. } => "success",
            FlowState::Failed { .. } => "failed",
        }
    }
}

/// Proof that a `begin_processing` call happened, tied to the flow generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pass the ticket to `complete`"]
pub struct ProcessTicket {
    generation: u64,
}

#[derive(Debug)]
pub struct UploadFlow {
    state: FlowState,
    generation: u64,
}

impl Default for UploadFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn selected_file(&self) -> Option<&UploadCandidate> {
        match &self.state {
            FlowState::Idle => None,
            FlowState::FileSelected { file }
            | FlowState::Processing { file }
            | FlowState::Success { file, .. }
            | FlowState::Failed { file, .. } => Some(file),
        }
    }

    pub fn result(&self) -> Option<&OcrResponse> {
        match &self.state {
            FlowState::Success { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FlowState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, FlowState::Processing { .. })
    }

    /// Whether the "Process" action is enabled.
    pub fn can_process(&self) -> bool {
        matches!(self.state, FlowState::FileSelected { .. })
    }

    /// Choose a file, replacing any previous file, result or error.
    pub fn select_file(&mut self, file: UploadCandidate) -> Result<(), FlowError> {
        if self.is_processing() {
            return Err(FlowError::AlreadyProcessing);
        }
        if !file.is_allowed() {
            return Err(FlowError::UnsupportedMediaType {
                media_type: file.media_type().to_string(),
            });
        }

        debug!("Selected {} ({})", file.name(), file.media_type());
        self.state = FlowState::FileSelected { file };
        Ok(())
    }

    /// Move `FileSelected → Processing`.
    pub fn begin_processing(&mut self) -> Result<ProcessTicket, FlowError> {
        let file = match std::mem::replace(&mut self.state, FlowState::Idle) {
            FlowState::FileSelected { file } => file,
            other => {
                let err = if matches!(other, FlowState::Processing { .. }) {
                    FlowError::AlreadyProcessing
                } else {
                    FlowError::NoFileSelected
                };
                self.state = other;
                return Err(err);
            }
        };

        info!("Processing {}", file.name());
        self.state = FlowState::Processing { file };
        Ok(ProcessTicket {
            generation: self.generation,
        })
    }

    /// Record the outcome of a request started with `ticket`.
    ///
    /// Returns false when the outcome was discarded because the flow was reset
    /// (or otherwise moved on) after the ticket was issued.
    pub fn complete(
        &mut self,
        ticket: ProcessTicket,
        outcome: Result<OcrResponse, String>,
    ) -> bool {
        let file = match std::mem::replace(&mut self.state, FlowState::Idle) {
            FlowState::Processing { file } if ticket.generation == self.generation => file,
            other => {
                self.state = other;
                warn!("Discarding outcome of an abandoned request");
                return false;
            }
        };

        self.state = match outcome {
            Ok(result) => {
                info!("Processed {}: {} result(s)", file.name(), result.results.len());
                FlowState::Success { file, result }
            }
            Err(message) => {
                let error = if message.trim().is_empty() {
                    GENERIC_FAILURE_MESSAGE.to_string()
                } else {
                    message
                };
                warn!("Processing {} failed: {}", file.name(), error);
                FlowState::Failed { file, error }
            }
        };
        true
    }

    /// Return to `Idle`, dropping file, result and error.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = FlowState::Idle;
    }

    /// Run the selected file through the gateway and record the outcome.
    pub async fn process(&mut self, gateway: &OcrGateway) -> Result<(), FlowError> {
        let ticket = self.begin_processing()?;
        let file = self
            .selected_file()
            .cloned()
            .ok_or(FlowError::NoFileSelected)?;

        let outcome = gateway
            .submit_for_display(&file)
            .await
            .map_err(|e| e.to_string());
        self.complete(ticket, outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FileResult;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pdf() -> UploadCandidate {
        UploadCandidate::new("doc.pdf", "application/pdf", b"%PDF".to_vec())
    }

    fn result() -> OcrResponse {
        let mut results = BTreeMap::new();
        results.insert("doc.pdf".to_string(), FileResult::new("# Hi"));
        OcrResponse {
            backend: "x".to_string(),
            version: "1.0".to_string(),
            results,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_happy_path() {
        let mut flow = UploadFlow::new();
        assert_eq!(flow.state(), &FlowState::Idle);
        assert!(!flow.can_process());

        flow.select_file(pdf()).unwrap();
        assert!(flow.can_process());

        let ticket = flow.begin_processing().unwrap();
        assert!(flow.is_processing());
        assert!(!flow.can_process());

        assert!(flow.complete(ticket, Ok(result())));
        assert_eq!(flow.result(), Some(&result()));
        assert_eq!(flow.selected_file(), Some(&pdf()));
    }

    #[test]
    fn test_failure_stores_message_or_fallback() {
        let mut flow = UploadFlow::new();
        flow.select_file(pdf()).unwrap();
        let ticket = flow.begin_processing().unwrap();
        flow.complete(ticket, Err("No file provided".to_string()));
        assert_eq!(flow.error(), Some("No file provided"));

        flow.select_file(pdf()).unwrap();
        let ticket = flow.begin_processing().unwrap();
        flow.complete(ticket, Err(String::new()));
        assert_eq!(flow.error(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn test_select_clears_previous_outcome() {
        let mut flow = UploadFlow::new();
        flow.select_file(pdf()).unwrap();
        let ticket = flow.begin_processing().unwrap();
        flow.complete(ticket, Ok(result()));

        let png = UploadCandidate::new("scan.png", "image/png", vec![1, 2, 3]);
        flow.select_file(png.clone()).unwrap();
        assert_eq!(flow.state(), &FlowState::FileSelected { file: png });
        assert!(flow.result().is_none());

        let ticket = flow.begin_processing().unwrap();
        flow.complete(ticket, Err("boom".to_string()));
        flow.select_file(pdf()).unwrap();
        assert!(flow.error().is_none());
        assert!(flow.can_process());
    }

    #[test]
    fn test_reset_from_every_state() {
        let mut flow = UploadFlow::new();
        flow.reset();
        assert_eq!(flow.state(), &FlowState::Idle);

        flow.select_file(pdf()).unwrap();
        flow.reset();
        assert_eq!(flow.state(), &FlowState::Idle);

        flow.select_file(pdf()).unwrap();
        let _ticket = flow.begin_processing().unwrap();
        flow.reset();
        assert_eq!(flow.state(), &FlowState::Idle);

        flow.select_file(pdf()).unwrap();
        let ticket = flow.begin_processing().unwrap();
        flow.complete(ticket, Ok(result()));
        flow.reset();
        assert_eq!(flow.state(), &FlowState::Idle);
        assert!(flow.selected_file().is_none());
        assert!(flow.result().is_none());
        assert!(flow.error().is_none());
    }

    #[test]
    fn test_outcome_after_reset_is_discarded() {
        let mut flow = UploadFlow::new();
        flow.select_file(pdf()).unwrap();
        let stale = flow.begin_processing().unwrap();
        flow.reset();

        flow.select_file(pdf()).unwrap();
        let fresh = flow.begin_processing().unwrap();

        assert!(!flow.complete(stale, Ok(result())));
        assert!(flow.is_processing());
        assert!(flow.complete(fresh, Err("late".to_string())));
        assert_eq!(flow.error(), Some("late"));
    }

    #[test]
    fn test_illegal_transitions() {
        let mut flow = UploadFlow::new();
        assert_eq!(flow.begin_processing(), Err(FlowError::NoFileSelected));

        flow.select_file(pdf()).unwrap();
        let _ticket = flow.begin_processing().unwrap();
        assert_eq!(flow.begin_processing(), Err(FlowError::AlreadyProcessing));
        assert_eq!(flow.select_file(pdf()), Err(FlowError::AlreadyProcessing));
        assert!(flow.is_processing());
    }

    #[test]
    fn test_unsupported_file_leaves_state_untouched() {
        let mut flow = UploadFlow::new();
        flow.select_file(pdf()).unwrap();

        let txt = UploadCandidate::new("notes.txt", "text/plain", b"hi".to_vec());
        assert_eq!(
            flow.select_file(txt),
            Err(FlowError::UnsupportedMediaType {
                media_type: "text/plain".to_string()
            })
        );
        assert_eq!(flow.selected_file(), Some(&pdf()));
    }

    #[tokio::test]
    async fn test_process_through_gateway() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "OCR processing failed: 503 Service Unavailable"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        let gateway = OcrGateway::new(format!("{}/api/ocr", mock_server.uri()));

        let mut flow = UploadFlow::new();
        flow.select_file(pdf()).unwrap();
        flow.process(&gateway).await.unwrap();

        assert_eq!(
            flow.error(),
            Some("OCR processing failed: 503 Service Unavailable")
        );
        assert_eq!(flow.state().label(), "failed");

        // Starting over for the next file.
        flow.reset();
        assert_eq!(flow.state().label(), "idle");
        flow.select_file(pdf()).unwrap();
        assert_eq!(flow.state().label(), "file selected");
    }
}
