//! Command error types for the terminal front end
//!
//! Serialize to `{"code": "...", "message": "..."}` for `--json` output.

use docqa_core::{ClientError, Operation};
use serde::Serialize;
use thiserror::Error;

/// Errors returned by commands
#[derive(Debug, Clone, Serialize, Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum CommandError {
    /// Blocked locally before any request
    #[error("{message}")]
    InvalidInput { message: String },

    /// The service answered with a non-2xx status
    #[error("{message}")]
    Rejected { message: String, status: u16 },

    /// Network failure or malformed response
    #[error("{message}")]
    Unreachable { message: String },

    #[error("{message}")]
    Busy { message: String },

    #[error("{message}")]
    Cancelled { message: String },

    #[error("{message}")]
    FileError { message: String },

    #[error("{message}")]
    InternalError { message: String },
}

impl CommandError {
    /// Map a client failure to the message shown for `op`.
    pub fn from_client(op: Operation, err: ClientError) -> Self {
        let message = err.user_message(op);
        match err {
            ClientError::Validation(_) => Self::InvalidInput { message },
            ClientError::ServerRejection { status, .. } => Self::Rejected { message, status },
            ClientError::Transport(_) => Self::Unreachable { message },
            ClientError::Io(_) => Self::FileError { message },
            ClientError::Busy => Self::Busy { message },
            ClientError::Cancelled => Self::Cancelled { message },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput { .. } => 2,
            Self::Cancelled { .. } => 130,
            _ => 1,
        }
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

/// Result type alias for commands
pub type CommandResult<T> = Result<T, CommandError>;

/// Extension trait for attaching the failing operation to client results
pub trait ResultExt<T> {
    fn for_op(self, op: Operation) -> CommandResult<T>;
}

impl<T> ResultExt<T> for Result<T, ClientError> {
    fn for_op(self, op: Operation) -> CommandResult<T> {
        self.map_err(|e| CommandError::from_client(op, e))
    }
}
