//! Wire types for the document service's JSON contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A document known to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    /// RFC 3339 timestamp as sent by the server
    #[serde(default)]
    pub uploaded_at: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Chunk count for one document inside [`RegistryStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunkCount {
    pub document_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chunk_count: u64,
}

/// Aggregate statistics over the vector store.
///
/// The service answers `{}` when its store is unavailable, so every field defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    #[serde(default)]
    pub total_documents: u64,
    #[serde(default)]
    pub total_chunks: u64,
    #[serde(default, rename = "documents")]
    pub per_document: Vec<DocumentChunkCount>,
}

impl RegistryStats {
    /// Average chunks per document, rounded to the nearest integer.
    pub fn average_chunks(&self) -> u64 {
        if self.total_documents == 0 {
            return 0;
        }
        (self.total_chunks as f64 / self.total_documents as f64).round() as u64
    }
}

/// Statistics for a single document (`GET /api/stats/{id}/`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub document_id: i64,
    #[serde(default)]
    pub total_chunks: u64,
    #[serde(default)]
    pub chunks: Vec<serde_json::Value>,
}

/// Successful upload response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document: Document,
    #[serde(default)]
    pub vector_store_added: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A cited passage backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Similarity in `[0, 1]`
    pub similarity: f64,
    #[serde(default)]
    pub text_preview: String,
}

impl Source {
    /// Similarity as a percentage with one decimal place, e.g. `92.0%`.
    pub fn similarity_percent(&self) -> String {
        format!("{:.1}%", self.similarity * 100.0)
    }
}

/// Successful answer response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub answer_text: String,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default, rename = "processing_time")]
    pub processing_time_seconds: Option<f64>,
    #[serde(default)]
    pub semantic_search_used: bool,
    /// In server order; never re-sorted or filtered client-side
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// `GET /api/` index of routes and feature flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiIndex {
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_percent() {
        let source = Source {
            similarity: 0.92,
            text_preview: String::new(),
        };
        assert_eq!(source.similarity_percent(), "92.0%");

        let source = Source {
            similarity: 0.8749,
            text_preview: String::new(),
        };
        assert_eq!(source.similarity_percent(), "87.5%");
    }

    #[test]
    fn test_stats_tolerates_empty_object() {
        let stats: RegistryStats = serde_json::from_str("{}").unwrap();
        assert_eq!(stats, RegistryStats::default());
        assert_eq!(stats.average_chunks(), 0);
    }

    #[test]
    fn test_stats_average_rounds() {
        let stats: RegistryStats = serde_json::from_value(serde_json::json!({
            "total_documents": 3,
            "total_chunks": 10,
            "documents": [
                {"document_id": 1, "title": "a.pdf", "chunk_count": 4},
                {"document_id": 2, "title": "b.pdf", "chunk_count": 3},
                {"document_id": 3, "title": "c.pdf", "chunk_count": 3}
            ]
        }))
        .unwrap();
        assert_eq!(stats.per_document.len(), 3);
        assert_eq!(stats.average_chunks(), 3);
    }

    #[test]
    fn test_minimal_answer() {
        let answer: Answer = serde_json::from_str(r#"{"answer": "42"}"#).unwrap();
        assert_eq!(answer.answer_text, "42");
        assert!(answer.sources.is_empty());
        assert!(!answer.semantic_search_used);
        assert!(answer.document.is_none());
    }

    #[test]
    fn test_document_optional_fields() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "id": 7,
            "title": "report.pdf"
        }))
        .unwrap();
        assert_eq!(doc.uploaded_at, "");
        assert_eq!(doc.file_size, None);
    }
}
