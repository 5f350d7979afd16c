//! Persisted records for uploads and conversations.

use serde::{Deserialize, Serialize};

/// An uploaded file that has been ingested into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    /// Same id as the indexed document, so deletes cascade to its chunks.
    pub id: String,
    /// Sanitised name of the stored file.
    pub filename: String,
    pub original_name: String,
    pub upload_date: String,
    pub file_size: u64,
    pub chunk_count: u32,
    pub content_preview: String,
}

/// One chat exchange. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub query: String,
    pub response: String,
    pub timestamp: String,
}
