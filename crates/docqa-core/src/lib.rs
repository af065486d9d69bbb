//! DocQA Core - client logic for a remote document-intelligence service
//!
//! This crate contains everything except the terminal front end:
//! - HTTP contract with the service (`api`)
//! - Local PDF checks before upload (`validation`)
//! - Shared document/statistics cache (`store`, `registry`)
//! - Upload, ask and manage workflows
//! - Settings persistence (`config`)

pub mod api;
pub mod ask;
pub mod config;
pub mod display;
pub mod error;
pub mod manage;
pub mod registry;
pub mod store;
pub mod upload;
pub mod validation;

mod flight;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use api::{ApiIndex, Document, DocumentApi, HttpDocumentApi, RegistryStats};
pub use ask::{AskRequest, AskState, AskView, AskWorkflow};
pub use config::{Config, Settings};
pub use error::{ClientError, ClientResult, Operation, ValidationError};
pub use manage::{ConfirmDeletion, DeleteOutcome, ManageWorkflow, ManagerView};
pub use registry::Registry;
pub use store::{DocumentStore, LoadState};
pub use upload::{UploadReceipt, UploadState, UploadWorkflow};

/// One client connection to the document service.
///
/// Owns the shared cache and the root cancellation scope. Every workflow handed out
/// gets its own child scope, so [`Session::shutdown`] abandons all in-flight requests.
pub struct Session {
    settings: Settings,
    api: Arc<dyn DocumentApi>,
    store: Arc<DocumentStore>,
    registry: Arc<Registry>,
    root: CancellationToken,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let api = Arc::new(HttpDocumentApi::new(&settings.api_base));
        Self::with_api(settings, api)
    }

    /// Build a session over any [`DocumentApi`] implementation.
    pub fn with_api(settings: Settings, api: Arc<dyn DocumentApi>) -> Self {
        let root = CancellationToken::new();
        let store = Arc::new(DocumentStore::new());
        let registry = Arc::new(Registry::new(
            Arc::clone(&api),
            Arc::clone(&store),
            root.child_token(),
        ));

        Self {
            settings,
            api,
            store,
            registry,
            root,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn upload_workflow(&self) -> UploadWorkflow {
        UploadWorkflow::new(
            Arc::clone(&self.api),
            Arc::clone(&self.registry),
            self.root.child_token(),
            self.settings.max_upload_bytes,
        )
    }

    pub fn ask_workflow(&self) -> AskWorkflow {
        AskWorkflow::new(
            Arc::clone(&self.api),
            Arc::clone(&self.store),
            self.root.child_token(),
            self.settings.use_semantic_search,
        )
    }

    pub fn manager(&self) -> ManageWorkflow {
        ManageWorkflow::new(
            Arc::clone(&self.api),
            Arc::clone(&self.registry),
            self.root.child_token(),
        )
    }

    pub fn indexing_notice_delay(&self) -> Duration {
        Duration::from_millis(self.settings.indexing_notice_delay_ms)
    }

    /// Initial load of documents and statistics.
    pub async fn mount(&self) -> ClientResult<Arc<Vec<Document>>> {
        info!(api_base = %self.settings.api_base, "Loading document registry");
        self.registry.refresh_all().await
    }

    /// Connectivity check. Returns the service's reply unchanged, or
    /// `{"error": "Test failed"}` when it cannot be reached.
    pub async fn probe(&self) -> serde_json::Value {
        let token = self.root.child_token();
        match flight::guarded(&token, self.api.probe()).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Connectivity check failed: {}", e);
                json!({ "error": e.user_message(Operation::Probe) })
            }
        }
    }

    /// Routes and feature flags advertised by the service.
    pub async fn endpoints(&self) -> ClientResult<ApiIndex> {
        let token = self.root.child_token();
        flight::guarded(&token, self.api.index()).await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Abandon every in-flight request.
    pub fn shutdown(&self) {
        info!("Cancelling in-flight requests");
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manage::AlwaysConfirm;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> Settings {
        Settings::default().with_api_base(Some(&server.uri()))
    }

    #[tokio::test]
    async fn test_mount_loads_registry() {
        let server = MockServer::start().await;
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
                "total_documents": 1,
                "total_chunks": 3,
                "documents": [{"document_id": 7, "title": "report.pdf", "chunk_count": 3}]
            })))
            .mount(&server)
            .await;

        let session = Session::new(settings(&server));
        let documents = session.mount().await.unwrap();

        assert_eq!(documents.len(), 1);
        let stats = session.store().stats().await.unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.per_document[0].chunk_count, 3);
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let session = Session::new(Settings::default().with_api_base(Some(&uri)));
        assert_eq!(session.probe().await, json!({"error": "Test failed"}));
    }

    #[tokio::test]
    async fn test_workflows_use_snapshot_during_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/documents/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([
                        {"id": 7, "title": "report.pdf", "uploaded_at": "2024-01-01T00:00:00Z"}
                    ]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/ask/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "42"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/delete/7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::new(settings(&server));
        session
            .store()
            .replace_documents(vec![Document {
                id: 7,
                title: "report.pdf".to_string(),
                uploaded_at: "2024-01-01T00:00:00Z".to_string(),
                file_size: None,
            }])
            .await;

        let ask = session.ask_workflow();
        ask.set_question("What is the answer?").await;
        ask.select_document(Some(7)).await;
        let manager = session.manager();

        let during = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let view = manager.render().await;
            let answer = ask.submit().await;
            let deleted = manager.delete(7, &AlwaysConfirm).await;
            (view, answer, deleted)
        };
        let (refreshed, (view, answer, deleted)) =
            tokio::join!(session.registry().refresh_documents(), during);

        assert!(view.loading);
        assert_eq!(view.documents.len(), 1);
        assert_eq!(answer.unwrap().answer.answer_text, "42");
        assert_eq!(deleted.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(refreshed.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "endpoints": {"upload": "/api/upload/"},
                "features": {"semantic_search": true}
            })))
            .mount(&server)
            .await;

        let index = Session::new(settings(&server)).endpoints().await.unwrap();
        assert_eq!(index.endpoints["upload"], "/api/upload/");
        assert_eq!(index.features.get("semantic_search"), Some(&true));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_workflows() {
        let server = MockServer::start().await;
        let session = Session::new(settings(&server));
        session.shutdown();

        assert!(session.cancellation_token().is_cancelled());
        assert!(matches!(
            session.endpoints().await,
            Err(ClientError::Cancelled)
        ));
        assert!(matches!(session.mount().await, Err(ClientError::Cancelled)));
    }
}
