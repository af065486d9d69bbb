//! Question-answering state machine: `Idle -> Submitting -> Answered | Failed`.
//!
//! The form (question, selected document, semantic-search toggle) lives apart from the
//! request state so a failed ask never clears what the user typed.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{Answer, Document, DocumentApi};
use crate::display::{format_processing_time, format_timestamp};
use crate::error::{ClientError, ClientResult, Operation, ValidationError};
use crate::flight::guarded;
use crate::store::DocumentStore;

/// A validated ask payload. Only constructible through [`AskRequest::new`], so an
/// empty question or a document outside the current list never reaches the network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    question: String,
    document_id: i64,
    use_semantic_search: bool,
}

impl AskRequest {
    pub fn new(
        question: &str,
        document_id: Option<i64>,
        use_semantic_search: bool,
        documents: &[Document],
    ) -> Result<Self, ValidationError> {
        if documents.is_empty() {
            return Err(ValidationError::NoDocuments);
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        let document_id = document_id.ok_or(ValidationError::NoDocumentSelected)?;
        if !documents.iter().any(|d| d.id == document_id) {
            return Err(ValidationError::UnknownDocument(document_id));
        }

        Ok(Self {
            question: question.to_string(),
            document_id,
            use_semantic_search,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn document_id(&self) -> i64 {
        self.document_id
    }

    pub fn use_semantic_search(&self) -> bool {
        self.use_semantic_search
    }
}

/// User input for the next ask.
#[derive(Debug, Clone, PartialEq)]
pub struct AskForm {
    pub question: String,
    pub document_id: Option<i64>,
    pub use_semantic_search: bool,
    /// Local message from the last blocked submit
    pub notice: Option<ValidationError>,
}

/// An answer together with the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuestion {
    pub request: AskRequest,
    pub answer: Answer,
    /// Registry entry for the asked document at completion time
    pub selected_document: Option<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskState {
    Idle,
    Submitting,
    Answered(Arc<AnsweredQuestion>),
    Failed(String),
}

/// One cited source, formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLine {
    pub similarity: String,
    pub text_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerPanel {
    pub answer: String,
    pub document_title: Option<String>,
    pub processing_time: Option<String>,
    pub semantic_search_used: bool,
    pub sources: Vec<SourceLine>,
}

impl AnswerPanel {
    fn from_answer(answer: &Answer) -> Self {
        Self {
            answer: answer.answer_text.clone(),
            document_title: answer.document.as_ref().map(|d| d.title.clone()),
            processing_time: answer.processing_time_seconds.map(format_processing_time),
            semantic_search_used: answer.semantic_search_used,
            sources: answer
                .sources
                .iter()
                .map(|s| SourceLine {
                    similarity: s.similarity_percent(),
                    text_preview: s.text_preview.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedDocumentInfo {
    pub id: i64,
    pub title: String,
    pub uploaded: String,
}

/// Everything the ask screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskView {
    pub submitting: bool,
    pub can_submit: bool,
    pub answer: Option<AnswerPanel>,
    pub selected_document: Option<SelectedDocumentInfo>,
    pub error: Option<String>,
}

pub struct AskWorkflow {
    api: Arc<dyn DocumentApi>,
    store: Arc<DocumentStore>,
    scope: CancellationToken,
    form: RwLock<AskForm>,
    state: RwLock<AskState>,
}

impl AskWorkflow {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        store: Arc<DocumentStore>,
        scope: CancellationToken,
        use_semantic_search: bool,
    ) -> Self {
        Self {
            api,
            store,
            scope,
            form: RwLock::new(AskForm {
                question: String::new(),
                document_id: None,
                use_semantic_search,
                notice: None,
            }),
            state: RwLock::new(AskState::Idle),
        }
    }

    pub async fn set_question(&self, question: impl Into<String>) {
        self.form.write().await.question = question.into();
    }

    pub async fn select_document(&self, document_id: Option<i64>) {
        self.form.write().await.document_id = document_id;
    }

    pub async fn set_semantic_search(&self, enabled: bool) {
        self.form.write().await.use_semantic_search = enabled;
    }

    pub async fn form(&self) -> AskForm {
        self.form.read().await.clone()
    }

    pub async fn state(&self) -> AskState {
        self.state.read().await.clone()
    }

    /// Ask the current question.
    ///
    /// Blocked locally (no request) for an empty question, no selection, or an empty
    /// document list. A new answer replaces the previous one wholesale.
    pub async fn submit(&self) -> ClientResult<Arc<AnsweredQuestion>> {
        let request = {
            let mut state = self.state.write().await;
            if matches!(*state, AskState::Submitting) {
                return Err(ClientError::Busy);
            }

            let documents = self.store.documents().await;
            let mut form = self.form.write().await;
            let request = match AskRequest::new(
                &form.question,
                form.document_id,
                form.use_semantic_search,
                &documents,
            ) {
                Ok(request) => request,
                Err(e) => {
                    form.notice = Some(e.clone());
                    return Err(e.into());
                }
            };
            form.notice = None;
            *state = AskState::Submitting;
            request
        };

        info!(
            document_id = request.document_id,
            semantic = request.use_semantic_search,
            "Asking question"
        );

        match guarded(&self.scope, self.api.ask(&request)).await {
            Ok(answer) => {
                info!(
                    sources = answer.sources.len(),
                    semantic_search_used = answer.semantic_search_used,
                    "Answer received"
                );
                let selected_document = self.store.find(request.document_id).await;
                let answered = Arc::new(AnsweredQuestion {
                    request,
                    answer,
                    selected_document,
                });
                *self.state.write().await = AskState::Answered(Arc::clone(&answered));
                Ok(answered)
            }
            Err(ClientError::Cancelled) => {
                *self.state.write().await = AskState::Idle;
                Err(ClientError::Cancelled)
            }
            Err(e) => {
                warn!("Question failed: {}", e);
                *self.state.write().await = AskState::Failed(e.user_message(Operation::Ask));
                Err(e)
            }
        }
    }

    /// Build the screen from the current form, state and registry snapshot.
    pub async fn render(&self) -> AskView {
        let form = self.form.read().await.clone();
        let state = self.state.read().await.clone();
        let documents = self.store.documents().await;

        let submitting = matches!(state, AskState::Submitting);
        let selected_document = form
            .document_id
            .and_then(|id| documents.iter().find(|d| d.id == id))
            .map(|d| SelectedDocumentInfo {
                id: d.id,
                title: d.title.clone(),
                uploaded: format_timestamp(&d.uploaded_at),
            });
        let can_submit = !submitting
            && !documents.is_empty()
            && selected_document.is_some()
            && !form.question.trim().is_empty();

        let (answer, failure) = match &state {
            AskState::Answered(answered) => {
                (Some(AnswerPanel::from_answer(&answered.answer)), None)
            }
            AskState::Failed(message) => (None, Some(message.clone())),
            AskState::Idle | AskState::Submitting => (None, None),
        };
        let error = form.notice.map(|n| n.to_string()).or(failure);

        AskView {
            submitting,
            can_submit,
            answer,
            selected_document,
            error,
        }
    }
}
