use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Where a document came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Built-in educational corpus loaded at startup.
    Seed,
    #[default]
    Upload,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Seed => write!(f, "seed"),
            DocumentKind::Upload => write!(f, "upload"),
        }
    }
}

/// Declared format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    /// Detect the format from a file name's extension (case-insensitive).
    pub fn from_filename(name: &str) -> Result<Self, IngestError> {
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::Txt),
            "" => Err(IngestError::UnsupportedFormat(format!(
                "{}: missing file extension",
                name
            ))),
            other => Err(IngestError::UnsupportedFormat(format!(
                "{}: .{} files are not supported (expected pdf, docx or txt)",
                name, other
            ))),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Docx => write!(f, "docx"),
            DocumentFormat::Txt => write!(f, "txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    pub kind: DocumentKind,
    pub format: DocumentFormat,
    pub metadata: DocumentMetadata,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    pub content: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub start_offset: u64,
    pub end_offset: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dense_vector: Vec<f32>,
    pub kind: DocumentKind,
    pub metadata: DocumentMetadata,
    pub created_at: String,
}

impl Document {
    /// Ids are stable per (kind, name) so re-ingesting a document replaces it.
    pub fn generate_id(kind: DocumentKind, name: &str) -> String {
        use sha2::{Digest, Sha256};
        let input = format!("{}:{}", kind, name);
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..16])
    }

    pub fn new(
        name: impl Into<String>,
        content: String,
        kind: DocumentKind,
        format: DocumentFormat,
        metadata: DocumentMetadata,
    ) -> Self {
        let name = name.into();
        Self {
            id: Self::generate_id(kind, &name),
            name,
            content,
            kind,
            format,
            metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn seed(name: &str, subject: &str, topic: &str, content: &str) -> Self {
        Self::new(
            name,
            content.to_string(),
            DocumentKind::Seed,
            DocumentFormat::Txt,
            DocumentMetadata {
                subject: Some(subject.to_string()),
                topic: Some(topic.to_string()),
                filename: None,
                size_bytes: content.len() as u64,
            },
        )
    }
}

impl DocumentChunk {
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn from_document(
        document: &Document,
        content: String,
        chunk_index: u32,
        total_chunks: u32,
        start_offset: u64,
        end_offset: u64,
    ) -> Self {
        Self {
            id: Self::generate_id(&document.id, chunk_index),
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            content,
            chunk_index,
            total_chunks,
            start_offset,
            end_offset,
            dense_vector: Vec::new(),
            kind: document.kind,
            metadata: document.metadata.clone(),
            created_at: document.created_at.clone(),
        }
    }
}
