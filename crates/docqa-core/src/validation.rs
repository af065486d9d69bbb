//! File checks run on selection and again at submit, before any network activity.

use std::path::{Path, PathBuf};

use crate::error::ValidationError;

/// Largest accepted upload (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const MIB: f64 = 1024.0 * 1024.0;

/// A file picked for upload. Lives for a single upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub validated: bool,
    pub validation_error: Option<String>,
}

impl UploadCandidate {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            size,
            validated: false,
            validation_error: None,
        }
    }

    /// Build a candidate from a file on disk, reading its current size.
    pub async fn inspect(path: &Path) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }
        Ok(Self::new(path, metadata.len()))
    }

    /// Record a validation outcome on the candidate.
    pub(crate) fn mark(&mut self, outcome: &Result<Accepted, ValidationError>) {
        match outcome {
            Ok(_) => {
                self.validated = true;
                self.validation_error = None;
            }
            Err(e) => {
                self.validated = false;
                self.validation_error = Some(e.to_string());
            }
        }
    }
}

/// A candidate that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    /// e.g. `2.00 MB`
    pub size_summary: String,
}

/// Validate against the default 10 MiB limit.
pub fn validate(candidate: &UploadCandidate) -> Result<Accepted, ValidationError> {
    validate_with_limit(candidate, MAX_UPLOAD_BYTES)
}

pub fn validate_with_limit(
    candidate: &UploadCandidate,
    max_bytes: u64,
) -> Result<Accepted, ValidationError> {
    if !has_pdf_extension(&candidate.file_name) {
        return Err(ValidationError::InvalidType {
            file_name: candidate.file_name.clone(),
        });
    }

    if candidate.size > max_bytes {
        return Err(ValidationError::TooLarge {
            size: candidate.size,
            limit_mb: max_bytes / (1024 * 1024),
        });
    }

    Ok(Accepted {
        size_summary: format_megabytes(candidate.size),
    })
}

/// Size in MB with two decimals.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB)
}

fn has_pdf_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
