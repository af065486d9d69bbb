//! Client-side cache of the service's document list and statistics.
//!
//! The store is a soft copy of server state. Readers get immutable `Arc` snapshots;
//! writers replace a slot wholesale. Documents and statistics load independently so
//! one can render while the other is still in flight or has failed.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::{Document, RegistryStats};

/// Load state of one cached resource.
#[derive(Debug)]
pub enum LoadState<T> {
    Idle,
    /// A fetch is in flight. The last loaded value stays readable until it lands.
    Loading(Option<Arc<T>>),
    Loaded(Arc<T>),
    Failed(String),
}

impl<T> Clone for LoadState<T> {
    fn clone(&self) -> Self {
        match self {
            LoadState::Idle => LoadState::Idle,
            LoadState::Loading(previous) => LoadState::Loading(previous.clone()),
            LoadState::Loaded(value) => LoadState::Loaded(Arc::clone(value)),
            LoadState::Failed(message) => LoadState::Failed(message.clone()),
        }
    }
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading(_))
    }

    /// The current value, including the one kept readable during a reload.
    pub fn loaded(&self) -> Option<Arc<T>> {
        match self {
            LoadState::Loaded(value) | LoadState::Loading(Some(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    fn reloading(&self) -> Self {
        LoadState::Loading(self.loaded())
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Shared document cache, injected into every workflow.
#[derive(Debug)]
pub struct DocumentStore {
    documents: RwLock<LoadState<Vec<Document>>>,
    stats: RwLock<LoadState<RegistryStats>>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(LoadState::Idle),
            stats: RwLock::new(LoadState::Idle),
        }
    }

    /// Current document list. Empty unless a load has succeeded.
    pub async fn documents(&self) -> Arc<Vec<Document>> {
        self.documents
            .read()
            .await
            .loaded()
            .unwrap_or_else(|| Arc::new(Vec::new()))
    }

    pub async fn documents_state(&self) -> LoadState<Vec<Document>> {
        self.documents.read().await.clone()
    }

    pub async fn find(&self, document_id: i64) -> Option<Document> {
        self.documents()
            .await
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
    }

    /// Latest statistics, or `None` when not loaded or the last fetch failed.
    pub async fn stats(&self) -> Option<Arc<RegistryStats>> {
        self.stats.read().await.loaded()
    }

    pub async fn stats_state(&self) -> LoadState<RegistryStats> {
        self.stats.read().await.clone()
    }

    pub(crate) async fn begin_documents_load(&self) {
        let mut guard = self.documents.write().await;
        *guard = guard.reloading();
    }

    pub async fn replace_documents(&self, documents: Vec<Document>) {
        *self.documents.write().await = LoadState::Loaded(Arc::new(documents));
    }

    /// Record a failed list fetch. Drops cached documents so dependents see none.
    pub(crate) async fn fail_documents(&self, message: String) {
        *self.documents.write().await = LoadState::Failed(message);
    }

    /// Drop one document from the cache. Returns whether it was present.
    ///
    /// During a reload the kept snapshot is rebuilt and the slot stays loading.
    pub async fn remove_document(&self, document_id: i64) -> bool {
        let mut guard = self.documents.write().await;
        let Some(current) = guard.loaded() else {
            return false;
        };
        if !current.iter().any(|d| d.id == document_id) {
            return false;
        }
        let remaining: Arc<Vec<Document>> = Arc::new(
            current
                .iter()
                .filter(|d| d.id != document_id)
                .cloned()
                .collect(),
        );
        *guard = if guard.is_loading() {
            LoadState::Loading(Some(remaining))
        } else {
            LoadState::Loaded(remaining)
        };
        true
    }

    /// Put back a state captured before an abandoned load.
    pub(crate) async fn restore_documents(&self, state: LoadState<Vec<Document>>) {
        *self.documents.write().await = state;
    }

    pub(crate) async fn begin_stats_load(&self) {
        let mut guard = self.stats.write().await;
        *guard = guard.reloading();
    }

    pub async fn replace_stats(&self, stats: RegistryStats) {
        *self.stats.write().await = LoadState::Loaded(Arc::new(stats));
    }

    pub(crate) async fn fail_stats(&self, message: String) {
        *self.stats.write().await = LoadState::Failed(message);
    }

    pub(crate) async fn restore_stats(&self, state: LoadState<RegistryStats>) {
        *self.stats.write().await = state;
    }
}
