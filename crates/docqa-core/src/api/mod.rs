//! HTTP client for the document service.
//!
//! [`DocumentApi`] is the seam every workflow talks through; [`HttpDocumentApi`] is the
//! reqwest implementation of the `/api/...` contract:
//!
//! ```text
//! POST   /api/upload/        multipart field `document`
//! POST   /api/ask/           {question, document_id, use_semantic_search}
//! GET    /api/documents/     [Document]
//! GET    /api/stats/         RegistryStats
//! GET    /api/stats/{id}/    DocumentStats
//! DELETE /api/delete/{id}/
//! GET    /api/test/          opaque JSON
//! GET    /api/               route index
//! ```

pub mod types;

use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::ask::AskRequest;
use crate::error::{ClientError, ClientResult, Operation};
use crate::validation::UploadCandidate;

pub use types::{
    Answer, ApiIndex, Document, DocumentChunkCount, DocumentStats, RegistryStats, Source,
    UploadResponse,
};
use types::ErrorBody;

/// Default service address.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Operations offered by the document service
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn upload(&self, candidate: &UploadCandidate) -> ClientResult<UploadResponse>;

    async fn ask(&self, request: &AskRequest) -> ClientResult<Answer>;

    async fn list_documents(&self) -> ClientResult<Vec<Document>>;

    async fn stats(&self) -> ClientResult<RegistryStats>;

    async fn document_stats(&self, document_id: i64) -> ClientResult<DocumentStats>;

    async fn delete(&self, document_id: i64) -> ClientResult<()>;

    /// Diagnostic probe; the body is passed through untouched.
    async fn probe(&self) -> ClientResult<serde_json::Value>;

    async fn index(&self) -> ClientResult<ApiIndex>;
}

/// reqwest-backed [`DocumentApi`].
#[derive(Debug, Clone)]
pub struct HttpDocumentApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Send a request, logging timing and mapping transport failures.
    async fn send(
        &self,
        op: Operation,
        request: reqwest::RequestBuilder,
    ) -> ClientResult<Response> {
        let request_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        debug!(%request_id, ?op, "Sending request");

        match request.send().await {
            Ok(response) => {
                info!(
                    %request_id,
                    ?op,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request completed"
                );
                Ok(response)
            }
            Err(e) => {
                error!(%request_id, ?op, "Request failed: {}", e);
                Err(ClientError::Transport(e.to_string()))
            }
        }
    }
}

/// Decode a 2xx body as `T`, or turn a non-2xx response into a [`ClientError::ServerRejection`].
async fn decode<T: DeserializeOwned>(op: Operation, response: Response) -> ClientResult<T> {
    let response = check_status(op, response).await?;
    response.json::<T>().await.map_err(|e| {
        error!(?op, "Failed to decode response: {}", e);
        ClientError::Transport(e.to_string())
    })
}

async fn check_status(op: Operation, response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(rejection(op, status, response).await)
}

async fn rejection(op: Operation, status: StatusCode, response: Response) -> ClientError {
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| op.rejection_fallback().to_string());

    warn!(?op, status = status.as_u16(), "Server rejected request: {}", message);
    ClientError::ServerRejection {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl DocumentApi for HttpDocumentApi {
    async fn upload(&self, candidate: &UploadCandidate) -> ClientResult<UploadResponse> {
        let bytes = tokio::fs::read(&candidate.path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(candidate.file_name.clone())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("document", part);

        let request = self.client.post(self.url("upload/")).multipart(form);
        let response = self.send(Operation::Upload, request).await?;
        decode(Operation::Upload, response).await
    }

    async fn ask(&self, request: &AskRequest) -> ClientResult<Answer> {
        let builder = self.client.post(self.url("ask/")).json(request);
        let response = self.send(Operation::Ask, builder).await?;
        decode(Operation::Ask, response).await
    }

    async fn list_documents(&self) -> ClientResult<Vec<Document>> {
        let request = self.client.get(self.url("documents/"));
        let response = self.send(Operation::Documents, request).await?;
        let value: serde_json::Value = decode(Operation::Documents, response).await?;

        // Anything but an array is an empty collection
        if !value.is_array() {
            warn!("Document list response is not an array, treating as empty");
            return Ok(Vec::new());
        }
        serde_json::from_value(value).map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn stats(&self) -> ClientResult<RegistryStats> {
        let request = self.client.get(self.url("stats/"));
        let response = self.send(Operation::Stats, request).await?;
        decode(Operation::Stats, response).await
    }

    async fn document_stats(&self, document_id: i64) -> ClientResult<DocumentStats> {
        let request = self.client.get(self.url(&format!("stats/{}/", document_id)));
        let response = self.send(Operation::Stats, request).await?;
        decode(Operation::Stats, response).await
    }

    async fn delete(&self, document_id: i64) -> ClientResult<()> {
        let request = self
            .client
            .delete(self.url(&format!("delete/{}/", document_id)));
        let response = self.send(Operation::Delete, request).await?;
        check_status(Operation::Delete, response).await?;
        Ok(())
    }

    async fn probe(&self) -> ClientResult<serde_json::Value> {
        let request = self.client.get(self.url("test/"));
        let response = self.send(Operation::Probe, request).await?;
        // Surfaced as-is, whatever the status
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn index(&self) -> ClientResult<ApiIndex> {
        let request = self.client.get(self.url(""));
        let response = self.send(Operation::Probe, request).await?;
        decode(Operation::Probe, response).await
    }
}
