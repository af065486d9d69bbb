//! Error types shared by every workflow.
//!
//! Three families:
//! - [`ValidationError`] is raised before any request is built and never reaches the network.
//! - [`ClientError::ServerRejection`] carries the server's `{"error": ...}` text verbatim.
//! - [`ClientError::Transport`] covers connection and decode failures; users only ever see a
//!   generic per-operation message for it.

use thiserror::Error;

/// Client-side rejections caught before a request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a PDF file.")]
    InvalidType { file_name: String },

    #[error("File size must be less than {limit_mb}MB.")]
    TooLarge { size: u64, limit_mb: u64 },

    #[error("Please select a file to upload.")]
    NoFileSelected,

    #[error("Please enter a question.")]
    EmptyQuestion,

    #[error("Please select a document.")]
    NoDocumentSelected,

    #[error("No documents available. Please upload a document first.")]
    NoDocuments,

    #[error("Document {0} is not in the current document list.")]
    UnknownDocument(i64),
}

/// The user-facing operation a failure belongs to. Picks the fallback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Ask,
    Delete,
    Documents,
    Stats,
    Probe,
}

impl Operation {
    /// Shown when the server rejects a request without a usable `error` field.
    pub fn rejection_fallback(self) -> &'static str {
        match self {
            Operation::Upload => "Upload failed",
            Operation::Ask => "Failed to get answer",
            Operation::Delete => "Failed to delete document",
            Operation::Documents => "Failed to load documents",
            Operation::Stats => "Failed to load statistics",
            Operation::Probe => "Test failed",
        }
    }

    /// Shown for network or decode failures.
    pub fn transport_message(self) -> &'static str {
        match self {
            Operation::Upload => "An error occurred during upload",
            Operation::Ask => {
                "An error occurred while processing your question. Please try again."
            }
            Operation::Delete => "An error occurred while deleting the document",
            Operation::Documents => "Failed to load documents. Please try refreshing the page.",
            Operation::Stats => "Failed to load statistics",
            Operation::Probe => "Test failed",
        }
    }
}

/// Errors surfaced by the API client and the workflows built on it.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("server rejected request ({status}): {message}")]
    ServerRejection { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a request is already in flight")]
    Busy,

    #[error("request abandoned")]
    Cancelled,
}

impl ClientError {
    /// Text to show the user for a failure of `op`.
    pub fn user_message(&self, op: Operation) -> String {
        match self {
            ClientError::Validation(e) => e.to_string(),
            ClientError::ServerRejection { message, .. } => message.clone(),
            ClientError::Transport(_) => op.transport_message().to_string(),
            ClientError::Io(e) => e.to_string(),
            ClientError::Busy => "Please wait for the current request to finish.".to_string(),
            ClientError::Cancelled => "Request cancelled.".to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_is_verbatim() {
        let err = ClientError::ServerRejection {
            status: 404,
            message: "Document not found".to_string(),
        };
        assert_eq!(err.user_message(Operation::Ask), "Document not found");
    }

    #[test]
    fn test_transport_message_is_generic() {
        let err = ClientError::Transport("connection refused (os error 111)".to_string());
        assert_eq!(
            err.user_message(Operation::Delete),
            "An error occurred while deleting the document"
        );
        assert!(!err.user_message(Operation::Upload).contains("os error"));
    }

    #[test]
    fn test_validation_message() {
        let err = ClientError::from(ValidationError::EmptyQuestion);
        assert!(err.is_validation());
        assert_eq!(err.user_message(Operation::Ask), "Please enter a question.");
    }
}
