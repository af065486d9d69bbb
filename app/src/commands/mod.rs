use std::path::Path;

use docqa_core::api::DocumentStats;
use docqa_core::ask::AskView;
use docqa_core::manage::{ConfirmDeletion, DeleteOutcome, ManagerView, StatsPanel};
use docqa_core::{ApiIndex, Operation, Session, UploadReceipt};
use serde::Serialize;

use crate::error::{CommandError, CommandResult, ResultExt};

/// Either the whole-registry panel or one document's chunk statistics
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatsReport {
    Registry(StatsPanel),
    Document(DocumentStats),
}

/// Validate and upload one PDF, then refresh the registry.
pub async fn upload_document(session: &Session, path: &Path) -> CommandResult<UploadReceipt> {
    let upload = session.upload_workflow();
    upload.select_file(path).await.for_op(Operation::Upload)?;
    upload.submit().await.for_op(Operation::Upload)
}

/// Ask a question about one document.
///
/// Loads the registry first so the document id can be checked locally.
pub async fn ask_question(
    session: &Session,
    document_id: Option<i64>,
    question: &str,
    use_semantic_search: Option<bool>,
) -> CommandResult<AskView> {
    session.mount().await.for_op(Operation::Documents)?;

    let ask = session.ask_workflow();
    ask.set_question(question).await;
    ask.select_document(document_id).await;
    if let Some(enabled) = use_semantic_search {
        ask.set_semantic_search(enabled).await;
    }

    ask.submit().await.for_op(Operation::Ask)?;
    Ok(ask.render().await)
}

/// Document list with the statistics panel.
pub async fn list_documents(session: &Session) -> CommandResult<ManagerView> {
    let manager = session.manager();
    manager.refresh().await.for_op(Operation::Documents)?;
    Ok(manager.render().await)
}

pub async fn get_stats(session: &Session, document_id: Option<i64>) -> CommandResult<StatsReport> {
    if let Some(id) = document_id {
        let stats = session
            .registry()
            .document_stats(id)
            .await
            .for_op(Operation::Stats)?;
        return Ok(StatsReport::Document(stats));
    }

    let manager = session.manager();
    session.registry().refresh_stats().await;
    manager
        .render()
        .await
        .stats
        .map(StatsReport::Registry)
        .ok_or_else(|| CommandError::Unreachable {
            message: Operation::Stats.rejection_fallback().to_string(),
        })
}

/// Delete one document after `confirm` agrees.
pub async fn delete_document(
    session: &Session,
    document_id: i64,
    confirm: &dyn ConfirmDeletion,
) -> CommandResult<DeleteOutcome> {
    let manager = session.manager();
    manager.refresh().await.for_op(Operation::Documents)?;
    manager
        .delete(document_id, confirm)
        .await
        .for_op(Operation::Delete)
}

/// Connectivity check. Never fails; unreachable services yield `{"error": ...}`.
pub async fn test_connection(session: &Session) -> serde_json::Value {
    session.probe().await
}

pub async fn list_endpoints(session: &Session) -> CommandResult<ApiIndex> {
    session.endpoints().await.for_op(Operation::Probe)
}
