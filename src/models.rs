//! Core data models for the QA pipeline.
//!
//! These types represent documents, chunks, and answers as they flow
//! through ingestion and retrieval. Documents exist only during
//! ingestion; chunks persist in the vector index.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// File formats the loader can parse. Adding a variant requires
/// extending the dispatch in `loader::parse_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Map a lowercase file extension to a format, if supported.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// A parsed source file. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
    pub body: String,
    pub format: DocumentFormat,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the raw file bytes, used for deduplication.
    pub content_hash: String,
}

/// Metadata carried by every chunk: a fixed allow-listed field set plus
/// one residual map for extension fields.
#[derive(Debug, Clone, Default)]
pub struct ChunkMetadata {
    pub source_path: String,
    pub format: String,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub extra: BTreeMap<String, String>,
}

/// A bounded slice of a document's text, the unit of retrieval.
/// Immutable after creation.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk as read back from the vector index.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A cited source passage returned alongside an answer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Source {
    pub content: String,
    /// Allow-listed metadata only; raw chunk metadata never leaves the engine.
    pub metadata: BTreeMap<String, String>,
}

/// The result of one `answer()` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("exe"), None);
    }

    #[test]
    fn test_unsupported_extension_is_none() {
        assert_eq!(DocumentFormat::from_extension(""), None);
        assert_eq!(DocumentFormat::from_extension("doc"), None);
    }
}
