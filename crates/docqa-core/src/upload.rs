//! Upload state machine.
//!
//! ```text
//! Idle ──select(ok)──► Validated ──submit──► Uploading ──► Succeeded
//!   ▲                      ▲                     │
//!   └──select(rejected)    └──── cancelled ──────┤
//!                                                └──────► Failed (file kept for retry)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{Document, DocumentApi};
use crate::error::{ClientError, ClientResult, Operation, ValidationError};
use crate::flight::guarded;
use crate::registry::Registry;
use crate::validation::{self, Accepted, UploadCandidate};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub document: Document,
    /// The service finished indexing the document for semantic search
    pub indexed: bool,
    pub message: String,
}

impl UploadReceipt {
    /// Follow-up confirmation shown a moment after success, when indexing completed.
    pub async fn indexing_notice(&self, delay: Duration) -> Option<String> {
        if !self.indexed {
            return None;
        }
        tokio::time::sleep(delay).await;
        Some("Document indexed for semantic search".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Idle {
        rejection: Option<ValidationError>,
    },
    Validated {
        candidate: UploadCandidate,
        accepted: Accepted,
    },
    Uploading(UploadCandidate),
    Succeeded(UploadReceipt),
    Failed {
        candidate: UploadCandidate,
        message: String,
    },
}

impl UploadState {
    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadState::Uploading(_))
    }

    /// The file currently selected, if any.
    pub fn candidate(&self) -> Option<&UploadCandidate> {
        match self {
            UploadState::Validated { candidate, .. }
            | UploadState::Uploading(candidate)
            | UploadState::Failed { candidate, .. } => Some(candidate),
            UploadState::Idle { .. } | UploadState::Succeeded(_) => None,
        }
    }
}

pub struct UploadWorkflow {
    api: Arc<dyn DocumentApi>,
    registry: Arc<Registry>,
    scope: CancellationToken,
    max_bytes: u64,
    state: RwLock<UploadState>,
}

impl UploadWorkflow {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        registry: Arc<Registry>,
        scope: CancellationToken,
        max_bytes: u64,
    ) -> Self {
        Self {
            api,
            registry,
            scope,
            max_bytes,
            state: RwLock::new(UploadState::Idle { rejection: None }),
        }
    }

    pub async fn state(&self) -> UploadState {
        self.state.read().await.clone()
    }

    /// Pick a file from disk and validate it.
    pub async fn select_file(&self, path: &Path) -> ClientResult<Accepted> {
        if self.state.read().await.is_uploading() {
            return Err(ClientError::Busy);
        }
        let candidate = UploadCandidate::inspect(path).await?;
        self.select(candidate).await
    }

    /// Validate an already-inspected candidate. A rejection leaves the workflow idle.
    pub async fn select(&self, mut candidate: UploadCandidate) -> ClientResult<Accepted> {
        let mut state = self.state.write().await;
        if state.is_uploading() {
            return Err(ClientError::Busy);
        }

        let outcome = validation::validate_with_limit(&candidate, self.max_bytes);
        candidate.mark(&outcome);
        match outcome {
            Ok(accepted) => {
                info!(file = %candidate.file_name, size = %accepted.size_summary, "File selected");
                *state = UploadState::Validated {
                    candidate,
                    accepted: accepted.clone(),
                };
                Ok(accepted)
            }
            Err(rejection) => {
                warn!(file = %candidate.file_name, "File rejected: {}", rejection);
                *state = UploadState::Idle {
                    rejection: Some(rejection.clone()),
                };
                Err(rejection.into())
            }
        }
    }

    /// Upload the selected file.
    ///
    /// The file is re-checked first, since it may have changed since selection.
    /// On success the candidate is cleared and the registry refreshed; on failure
    /// the candidate stays selected so the user can retry.
    pub async fn submit(&self) -> ClientResult<UploadReceipt> {
        let candidate = {
            let mut state = self.state.write().await;
            let selected = match &*state {
                UploadState::Uploading(_) => return Err(ClientError::Busy),
                UploadState::Validated { candidate, .. } | UploadState::Failed { candidate, .. } => {
                    candidate.clone()
                }
                UploadState::Idle { .. } | UploadState::Succeeded(_) => {
                    return Err(ValidationError::NoFileSelected.into())
                }
            };

            let mut current = match UploadCandidate::inspect(&selected.path).await {
                Ok(current) => current,
                Err(e) => {
                    *state = UploadState::Failed {
                        candidate: selected,
                        message: e.to_string(),
                    };
                    return Err(e.into());
                }
            };
            let outcome = validation::validate_with_limit(&current, self.max_bytes);
            current.mark(&outcome);
            if let Err(rejection) = outcome {
                *state = UploadState::Idle {
                    rejection: Some(rejection.clone()),
                };
                return Err(rejection.into());
            }

            *state = UploadState::Uploading(current.clone());
            current
        };

        info!(file = %candidate.file_name, size = candidate.size, "Uploading document");

        match guarded(&self.scope, self.api.upload(&candidate)).await {
            Ok(response) => {
                let receipt = UploadReceipt {
                    message: format!(
                        "Upload successful! \"{}\" (ID: {})",
                        response.document.title, response.document.id
                    ),
                    indexed: response.vector_store_added,
                    document: response.document,
                };
                info!(
                    document_id = receipt.document.id,
                    indexed = receipt.indexed,
                    "Document uploaded"
                );
                *self.state.write().await = UploadState::Succeeded(receipt.clone());

                if let Err(e) = self.registry.refresh_all().await {
                    warn!("Registry refresh after upload failed: {}", e);
                }
                Ok(receipt)
            }
            Err(ClientError::Cancelled) => {
                let accepted = Accepted {
                    size_summary: validation::format_megabytes(candidate.size),
                };
                *self.state.write().await = UploadState::Validated {
                    candidate,
                    accepted,
                };
                Err(ClientError::Cancelled)
            }
            Err(e) => {
                *self.state.write().await = UploadState::Failed {
                    candidate,
                    message: e.user_message(Operation::Upload),
                };
                Err(e)
            }
        }
    }

    /// Drop the selection and any result.
    pub async fn reset(&self) -> ClientResult<()> {
        let mut state = self.state.write().await;
        if state.is_uploading() {
            return Err(ClientError::Busy);
        }
        *state = UploadState::Idle { rejection: None };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpDocumentApi;
    use crate::store::DocumentStore;
    use crate::validation::MAX_UPLOAD_BYTES;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn workflow(server: &MockServer, scope: CancellationToken) -> UploadWorkflow {
        let api: Arc<dyn DocumentApi> = Arc::new(HttpDocumentApi::new(&server.uri()));
        let store = Arc::new(DocumentStore::new());
        let registry = Arc::new(Registry::new(api.clone(), store, scope.clone()));
        UploadWorkflow::new(api, registry, scope, MAX_UPLOAD_BYTES)
    }

    async fn write_file(dir: &Path, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, vec![b'%'; size]).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_then_registry_contains_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "document": {"id": 7, "title": "report.pdf", "uploaded_at": "2024-01-01T00:00:00Z"},
                "vector_store_added": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/documents/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 7, "title": "report.pdf", "uploaded_at": "2024-01-01T00:00:00Z"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/stats/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_documents": 1, "total_chunks": 4, "documents": []
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "report.pdf", 2 * 1024 * 1024).await;
        let upload = workflow(&server, CancellationToken::new());

        let accepted = upload.select_file(&file).await.unwrap();
        assert_eq!(accepted.size_summary, "2.00 MB");

        let receipt = upload.submit().await.unwrap();
        assert_eq!(receipt.document.id, 7);
        assert!(receipt.indexed);
        assert!(matches!(upload.state().await, UploadState::Succeeded(_)));
        assert!(upload.state().await.candidate().is_none());

        let store = upload.registry.store();
        assert!(store.find(7).await.is_some());
        assert_eq!(store.stats().await.unwrap().total_chunks, 4);

        let notice = receipt.indexing_notice(Duration::from_millis(1)).await;
        assert_eq!(notice.as_deref(), Some("Document indexed for semantic search"));
    }

    #[tokio::test]
    async fn test_invalid_type_never_reaches_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "notes.txt", 10).await;
        let upload = workflow(&server, CancellationToken::new());

        let err = upload.select_file(&file).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            upload.state().await,
            UploadState::Idle {
                rejection: Some(ValidationError::InvalidType {
                    file_name: "notes.txt".to_string()
                })
            }
        );

        let err = upload.submit().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::NoFileSelected)
        ));
    }

    #[tokio::test]
    async fn test_file_grown_after_selection_is_rejected_at_submit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "grows.pdf", 10).await;
        let upload = workflow(&server, CancellationToken::new());
        upload.select_file(&file).await.unwrap();

        tokio::fs::write(&file, vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize])
            .await
            .unwrap();

        let err = upload.submit().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_keeps_file_for_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "No file provided"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "document": {"id": 8, "title": "retry.pdf"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/documents/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "retry.pdf", 100).await;
        let upload = workflow(&server, CancellationToken::new());
        upload.select_file(&file).await.unwrap();

        let err = upload.submit().await.unwrap_err();
        assert_eq!(err.user_message(Operation::Upload), "No file provided");
        match upload.state().await {
            UploadState::Failed { candidate, message } => {
                assert_eq!(candidate.file_name, "retry.pdf");
                assert_eq!(message, "No file provided");
            }
            other => panic!("unexpected state: {:?}", other),
        }

        // Retry without reselecting
        let receipt = upload.submit().await.unwrap();
        assert_eq!(receipt.document.id, 8);
        assert!(!receipt.indexed);
        assert!(receipt.indexing_notice(Duration::ZERO).await.is_none());
    }

    #[tokio::test]
    async fn test_double_submit_is_busy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"document": {"id": 1, "title": "a.pdf"}}))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.pdf", 100).await;
        let upload = workflow(&server, CancellationToken::new());
        upload.select_file(&file).await.unwrap();

        let second = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            upload.submit().await
        };
        let (first, second) = tokio::join!(upload.submit(), second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(ClientError::Busy)));
    }

    #[tokio::test]
    async fn test_reset_after_failure_returns_to_idle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.pdf", 100).await;
        let upload = workflow(&server, CancellationToken::new());
        upload.select_file(&file).await.unwrap();
        assert!(upload.submit().await.is_err());
        assert!(matches!(upload.state().await, UploadState::Failed { .. }));

        upload.reset().await.unwrap();
        assert_eq!(upload.state().await, UploadState::Idle { rejection: None });
        assert!(matches!(
            upload.submit().await,
            Err(ClientError::Validation(ValidationError::NoFileSelected))
        ));
    }

    #[tokio::test]
    async fn test_reset_while_uploading_is_busy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"document": {"id": 1, "title": "a.pdf"}}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.pdf", 100).await;
        let upload = workflow(&server, CancellationToken::new());
        upload.select_file(&file).await.unwrap();

        let reset = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            upload.reset().await
        };
        let (submitted, reset) = tokio::join!(upload.submit(), reset);

        assert!(matches!(reset, Err(ClientError::Busy)));
        assert!(submitted.is_ok());
        assert!(matches!(upload.state().await, UploadState::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_cancelled_upload_returns_to_validated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"document": {"id": 1, "title": "a.pdf"}}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.pdf", 100).await;
        let scope = CancellationToken::new();
        let upload = workflow(&server, scope.clone());
        upload.select_file(&file).await.unwrap();

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            scope.cancel();
        };
        let (result, _) = tokio::join!(upload.submit(), cancel);

        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert!(matches!(
            upload.state().await,
            UploadState::Validated { .. }
        ));
    }
}
