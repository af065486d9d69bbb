//! Document management: listing, statistics panel and per-row deletion.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{Document, DocumentApi, DocumentChunkCount};
use crate::display::{format_file_size, format_timestamp};
use crate::error::{ClientError, ClientResult, Operation, ValidationError};
use crate::flight::guarded;
use crate::registry::Registry;
use crate::store::DocumentStore;

/// Asks the user before a document is deleted.
///
/// Implementations that wait on a terminal must not block the runtime.
#[async_trait]
pub trait ConfirmDeletion: Send + Sync {
    async fn confirm(&self, document: &Document) -> bool;
}

/// Skips the prompt. Used for `--yes` and in tests.
pub struct AlwaysConfirm;

#[async_trait]
impl ConfirmDeletion for AlwaysConfirm {
    async fn confirm(&self, _document: &Document) -> bool {
        true
    }
}

pub fn confirmation_prompt(document: &Document) -> String {
    format!(
        "Are you sure you want to delete \"{}\"? This action cannot be undone.",
        document.title
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Declined,
    AlreadyDeleting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRow {
    pub id: i64,
    pub title: String,
    pub uploaded: String,
    pub size: Option<String>,
    pub deleting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPanel {
    pub total_documents: u64,
    pub total_chunks: u64,
    pub average_chunks: u64,
    pub per_document: Vec<DocumentChunkCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerView {
    pub loading: bool,
    pub documents: Vec<DocumentRow>,
    /// Absent when statistics have not loaded or the last fetch failed
    pub stats: Option<StatsPanel>,
    pub error: Option<String>,
}

pub struct ManageWorkflow {
    api: Arc<dyn DocumentApi>,
    registry: Arc<Registry>,
    store: Arc<DocumentStore>,
    scope: CancellationToken,
    /// In-flight deletions keyed by document id
    deleting: RwLock<HashMap<i64, CancellationToken>>,
    error: RwLock<Option<String>>,
}

impl ManageWorkflow {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        registry: Arc<Registry>,
        scope: CancellationToken,
    ) -> Self {
        let store = Arc::clone(registry.store());
        Self {
            api,
            registry,
            store,
            scope,
            deleting: RwLock::new(HashMap::new()),
            error: RwLock::new(None),
        }
    }

    /// Reload documents and statistics. A list failure lands in the error banner.
    pub async fn refresh(&self) -> ClientResult<()> {
        match self.registry.refresh_all().await {
            Ok(_) => {
                *self.error.write().await = None;
                Ok(())
            }
            Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
            Err(e) => {
                *self.error.write().await = Some(e.user_message(Operation::Documents));
                Err(e)
            }
        }
    }

    /// Delete one document after confirmation.
    ///
    /// The row leaves the cache only once the service confirms. Deletions of different
    /// documents run independently; a second request for the same id is refused.
    pub async fn delete(
        &self,
        document_id: i64,
        confirm: &dyn ConfirmDeletion,
    ) -> ClientResult<DeleteOutcome> {
        let Some(document) = self.store.find(document_id).await else {
            return Err(ValidationError::UnknownDocument(document_id).into());
        };

        if self.deleting.read().await.contains_key(&document_id) {
            return Ok(DeleteOutcome::AlreadyDeleting);
        }
        if !confirm.confirm(&document).await {
            info!(document_id, "Deletion declined");
            return Ok(DeleteOutcome::Declined);
        }

        let token = self.scope.child_token();
        {
            let mut deleting = self.deleting.write().await;
            if deleting.contains_key(&document_id) {
                return Ok(DeleteOutcome::AlreadyDeleting);
            }
            deleting.insert(document_id, token.clone());
        }

        info!(document_id, title = %document.title, "Deleting document");
        let result = guarded(&token, self.api.delete(document_id)).await;
        self.deleting.write().await.remove(&document_id);

        match result {
            Ok(()) => {
                self.store.remove_document(document_id).await;
                *self.error.write().await = None;
                self.registry.refresh_stats().await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
            Err(e) => {
                warn!(document_id, "Delete failed: {}", e);
                *self.error.write().await = Some(e.user_message(Operation::Delete));
                Err(e)
            }
        }
    }

    /// Abandon an in-flight deletion. Returns whether one was running.
    pub async fn cancel_delete(&self, document_id: i64) -> bool {
        match self.deleting.read().await.get(&document_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn render(&self) -> ManagerView {
        let documents_state = self.store.documents_state().await;
        let deleting = self.deleting.read().await;

        let documents = documents_state
            .loaded()
            .map(|docs| {
                docs.iter()
                    .map(|d| DocumentRow {
                        id: d.id,
                        title: d.title.clone(),
                        uploaded: format_timestamp(&d.uploaded_at),
                        size: d.file_size.map(format_file_size),
                        deleting: deleting.contains_key(&d.id),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let stats = self.store.stats().await.map(|s| StatsPanel {
            total_documents: s.total_documents,
            total_chunks: s.total_chunks,
            average_chunks: s.average_chunks(),
            per_document: s.per_document.clone(),
        });

        let error = match self.error.read().await.clone() {
            Some(message) => Some(message),
            None => documents_state.error().map(str::to_string),
        };

        ManagerView {
            loading: documents_state.is_loading(),
            documents,
            stats,
            error,
        }
    }
}
