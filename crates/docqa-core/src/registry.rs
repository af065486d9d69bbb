//! Pull-based refresh of the document list and statistics into the [`DocumentStore`].
//!
//! The two fetches are independent. A failed list fetch is surfaced and empties the
//! cache; a failed stats fetch is logged and otherwise ignored.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{Document, DocumentApi, DocumentStats, RegistryStats};
use crate::error::{ClientError, ClientResult, Operation};
use crate::flight::guarded;
use crate::store::DocumentStore;

/// Fetches registry data from the service into the shared store.
pub struct Registry {
    api: Arc<dyn DocumentApi>,
    store: Arc<DocumentStore>,
    scope: CancellationToken,
}

impl Registry {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        store: Arc<DocumentStore>,
        scope: CancellationToken,
    ) -> Self {
        Self { api, store, scope }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Reload the document list.
    ///
    /// On failure the cache is emptied and the user-facing message is kept in the store.
    pub async fn refresh_documents(&self) -> ClientResult<Arc<Vec<Document>>> {
        let previous = self.store.documents_state().await;
        self.store.begin_documents_load().await;

        match guarded(&self.scope, self.api.list_documents()).await {
            Ok(documents) => {
                info!(count = documents.len(), "Document list refreshed");
                self.store.replace_documents(documents).await;
                Ok(self.store.documents().await)
            }
            Err(ClientError::Cancelled) => {
                self.store.restore_documents(previous).await;
                Err(ClientError::Cancelled)
            }
            Err(e) => {
                error!("Failed to fetch documents: {}", e);
                self.store
                    .fail_documents(e.user_message(Operation::Documents))
                    .await;
                Err(e)
            }
        }
    }

    /// Reload aggregate statistics. Failures are soft: logged, then `None`.
    pub async fn refresh_stats(&self) -> Option<Arc<RegistryStats>> {
        let previous = self.store.stats_state().await;
        self.store.begin_stats_load().await;

        match guarded(&self.scope, self.api.stats()).await {
            Ok(stats) => {
                info!(
                    total_documents = stats.total_documents,
                    total_chunks = stats.total_chunks,
                    "Statistics refreshed"
                );
                self.store.replace_stats(stats).await;
                self.store.stats().await
            }
            Err(ClientError::Cancelled) => {
                self.store.restore_stats(previous).await;
                None
            }
            Err(e) => {
                warn!("Failed to fetch stats: {}", e);
                self.store.fail_stats(e.to_string()).await;
                None
            }
        }
    }

    /// Refresh documents and statistics concurrently.
    pub async fn refresh_all(&self) -> ClientResult<Arc<Vec<Document>>> {
        let (documents, _) =
            futures::future::join(self.refresh_documents(), self.refresh_stats()).await;
        documents
    }

    /// Chunk statistics for a single document. Not cached.
    pub async fn document_stats(&self, document_id: i64) -> ClientResult<DocumentStats> {
        guarded(&self.scope, self.api.document_stats(document_id)).await
    }
}
