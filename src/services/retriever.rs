//! Query-time retrieval of the most similar chunks.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::embedding::Embedder;
use super::vector_store::VectorStore;
use crate::error::RetrievalError;
use crate::models::{RetrievalConfig, RetrievalResult};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k: config.top_k as usize,
            min_score: config.min_score,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve with the configured `top_k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(query, self.top_k).await
    }

    /// At most `k` hits, most similar first. Hits are returned as stored.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("query is empty".to_string()));
        }
        if k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "k must be greater than 0".to_string(),
            ));
        }

        let start = Instant::now();
        let query_vector = self.embedder.embed(query).await?;
        let mut hits = self
            .store
            .search(query_vector, k as u64, self.min_score)
            .await?;
        hits.truncate(k);

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(hits = hits.len(), k, duration_ms, "retrieved chunks");
        Ok(RetrievalResult::new(query, hits, duration_ms))
    }
}
