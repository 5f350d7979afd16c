//! Vector store abstraction layer.
//!
//! Backends store (vector, chunk text, metadata) and answer cosine k-NN queries.
//! The embedded SQLite backend is the default; Qdrant is available for larger
//! corpora.

mod qdrant;
mod sqlite;

pub use qdrant::QdrantBackend;
pub use sqlite::SqliteBackend;

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{DocumentChunk, SearchResult, VectorDriver, VectorStoreConfig};

/// Collection information
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// Operations every backend provides.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Returns None if the collection doesn't exist.
    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the collection if it doesn't exist.
    async fn create_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace chunks by id. Every chunk must carry its vector.
    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError>;

    /// Swap a document's chunks for `chunks`.
    ///
    /// Backends with transactions override this so the old chunks survive a failed write.
    async fn replace_document(
        &self,
        document_id: &str,
        chunks: Vec<DocumentChunk>,
    ) -> Result<(), VectorStoreError> {
        self.delete_by_document_ids(&[document_id.to_string()])
            .await?;
        self.upsert_points(chunks).await
    }

    /// Nearest chunks by cosine similarity, most similar first.
    ///
    /// Fails with `NotInitialized` when the collection was never created.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchResult>, VectorStoreError>;

    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    /// Delete every chunk belonging to the given documents.
    async fn delete_by_document_ids(&self, document_ids: &[String])
    -> Result<(), VectorStoreError>;

    async fn contains_document(&self, document_id: &str) -> Result<bool, VectorStoreError>;

    /// Remove all points, keeping the collection.
    async fn clear_collection(&self) -> Result<(), VectorStoreError>;

    fn collection(&self) -> &str;
}

/// Create the configured backend. `index_dir` is used by the SQLite driver.
pub async fn create_backend(
    config: &VectorStoreConfig,
    index_dir: &Path,
    embedding_dim: u64,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Sqlite => {
            let backend = SqliteBackend::open(index_dir, &config.collection, embedding_dim)?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, embedding_dim)?;
            Ok(Arc::new(backend))
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Descending score, ties broken by ascending chunk id.
pub(crate) fn rank_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, DocumentMetadata};

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk_id: id.to_string(),
            score,
            content: String::new(),
            document_id: "d".to_string(),
            document_name: "d".to_string(),
            chunk_index: 0,
            kind: DocumentKind::Seed,
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_results_breaks_ties_by_id() {
        let mut results = vec![result("b", 0.5), result("c", 0.9), result("a", 0.5)];
        rank_results(&mut results);
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_create_backend_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_backend(&VectorStoreConfig::default(), dir.path(), 8)
            .await
            .unwrap();
        assert!(store.health_check().await.unwrap());
        assert!(store.get_collection_info().await.unwrap().is_none());
        store.create_collection().await.unwrap();
        assert_eq!(
            store.get_collection_info().await.unwrap().unwrap().points_count,
            0
        );
        assert!(dir.path().join("vectors.db").exists());
    }
}
