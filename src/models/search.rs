//! Retrieval models for queries, hits and generated answers.

use serde::{Deserialize, Serialize};

use super::document::{DocumentKind, DocumentMetadata};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A single retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching chunk ID
    pub chunk_id: String,

    /// Cosine similarity (higher is closer)
    pub score: f32,

    /// Chunk content
    pub content: String,

    pub document_id: String,

    /// Name used when citing the chunk as a source
    pub document_name: String,

    pub chunk_index: u32,

    pub kind: DocumentKind,

    pub metadata: DocumentMetadata,
}

/// Ordered hits for one query, most similar first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub hits: Vec<SearchResult>,
    pub duration_ms: u64,
}

impl RetrievalResult {
    pub fn new(query: impl Into<String>, hits: Vec<SearchResult>, duration_ms: u64) -> Self {
        Self {
            query: query.into(),
            hits,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Distinct document names in retrieval order.
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for hit in &self.hits {
            if !names.contains(&hit.document_name) {
                names.push(hit.document_name.clone());
            }
        }
        names
    }
}

/// Generated answer plus the documents it drew on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    /// True when the generation call failed and `text` is the fallback apology.
    #[serde(default)]
    pub fallback: bool,
}
