//! Document ingestion: extract, chunk, embed, upsert.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::extract::extract_text;
use super::vector_store::VectorStore;
use crate::error::IngestError;
use crate::models::{Document, DocumentFormat, DocumentKind, DocumentMetadata};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks_added: usize,
    /// Extracted text, used for upload previews.
    pub content: String,
}

/// Adds documents to the searchable corpus.
pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunker: TextChunker,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunker: TextChunker,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Chunk, embed and upsert a document, replacing any chunks it already has.
    ///
    /// Returns the number of chunks added.
    pub async fn ingest(&self, document: &Document) -> Result<usize, IngestError> {
        if document.content.trim().is_empty() {
            return Err(IngestError::EmptyContent(document.name.clone()));
        }

        let start = Instant::now();
        self.store.create_collection().await?;

        let mut chunks = self.chunker.chunk(document);
        let chunk_count = chunks.len();

        for batch in chunks.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_many(&texts).await?;
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.dense_vector = embedding;
            }
        }

        // Old chunks are only dropped once every new chunk has its vector.
        self.store.replace_document(&document.id, chunks).await?;

        info!(
            document.id = %document.id,
            document.name = %document.name,
            kind = %document.kind,
            chunk_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ingested document"
        );
        Ok(chunk_count)
    }

    /// Detect the format from `name`, extract the text and ingest it.
    ///
    /// An unsupported extension fails before the index is touched.
    pub async fn ingest_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        kind: DocumentKind,
    ) -> Result<IngestReport, IngestError> {
        let format = DocumentFormat::from_filename(name)?;
        let size_bytes = bytes.len() as u64;
        let content = extract_text(format, bytes).await?;
        debug!(name, %format, chars = content.chars().count(), "extracted text");

        let document = Document::new(
            name,
            content,
            kind,
            format,
            DocumentMetadata {
                filename: Some(name.to_string()),
                size_bytes,
                ..Default::default()
            },
        );
        let chunks_added = self.ingest(&document).await?;

        Ok(IngestReport {
            document_id: document.id,
            chunks_added,
            content: document.content,
        })
    }

    /// Ingest each document independently; one failure never stops the rest.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Vec<Result<usize, IngestError>> {
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let result = self.ingest(document).await;
            if let Err(ref e) = result {
                warn!(document.name = %document.name, error = %e, "failed to ingest document");
            }
            results.push(result);
        }
        results
    }

    /// Ingest the documents not yet present in the index. Returns how many were added.
    pub async fn ensure_seed_corpus(&self, documents: &[Document]) -> Result<usize, IngestError> {
        self.store.create_collection().await?;

        let mut missing = Vec::new();
        for document in documents {
            if !self.store.contains_document(&document.id).await? {
                missing.push(document.clone());
            }
        }

        if missing.is_empty() {
            debug!(documents = documents.len(), "seed corpus already indexed");
            return Ok(0);
        }

        let added = self
            .ingest_batch(&missing)
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count();
        info!(added, total = documents.len(), "seed corpus indexed");
        Ok(added)
    }

    /// Remove every chunk of a document.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), IngestError> {
        self.store
            .delete_by_document_ids(&[document_id.to_string()])
            .await?;
        info!(document.id = %document_id, "deleted document chunks");
        Ok(())
    }

    /// Number of chunks currently indexed (0 when the collection does not exist).
    pub async fn indexed_chunks(&self) -> Result<u64, IngestError> {
        Ok(self
            .store
            .get_collection_info()
            .await?
            .map_or(0, |info| info.points_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::HashEmbedder;
    use crate::services::vector_store::SqliteBackend;

    fn pipeline() -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(SqliteBackend::in_memory("test", 64).unwrap()),
            TextChunker::with_size(40, 10),
            2,
        )
    }

    fn text_document(name: &str, content: &str) -> Document {
        Document::new(
            name,
            content.to_string(),
            DocumentKind::Upload,
            DocumentFormat::Txt,
            DocumentMetadata::default(),
        )
    }

    #[tokio::test]
    async fn test_ingest_counts_chunks() {
        let pipeline = pipeline();
        let doc = text_document(
            "france.txt",
            "The capital of France is Paris. Paris is known for the Eiffel Tower.",
        );
        let added = pipeline.ingest(&doc).await.unwrap();
        assert!(added >= 2);
        assert_eq!(pipeline.indexed_chunks().await.unwrap(), added as u64);
        assert!(pipeline.store().contains_document(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reingest_replaces_chunks() {
        let pipeline = pipeline();
        let doc = text_document(
            "notes.txt",
            "Mitochondria produce energy. Ribosomes build proteins in the cell.",
        );
        let first = pipeline.ingest(&doc).await.unwrap();
        let second = pipeline.ingest(&doc).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(pipeline.indexed_chunks().await.unwrap(), first as u64);
    }

    #[tokio::test]
    async fn test_failed_reingest_keeps_previous_chunks() {
        let embedder = Arc::new(HashEmbedder::new(64));
        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            Arc::new(SqliteBackend::in_memory("test", 64).unwrap()),
            TextChunker::with_size(40, 10),
            2,
        );
        let doc = text_document(
            "notes.txt",
            "Mitochondria produce energy. Ribosomes build proteins in the cell.",
        );
        let added = pipeline.ingest(&doc).await.unwrap();

        embedder.set_failing(true);
        let result = pipeline.ingest(&doc).await;
        assert!(matches!(result, Err(IngestError::EmbeddingError(_))));

        assert!(pipeline.store().contains_document(&doc.id).await.unwrap());
        assert_eq!(pipeline.indexed_chunks().await.unwrap(), added as u64);
    }

    #[tokio::test]
    async fn test_blank_document_is_empty_content() {
        let pipeline = pipeline();
        let result = pipeline.ingest(&text_document("blank.txt", "  \n\t ")).await;
        assert!(matches!(result, Err(IngestError::EmptyContent(_))));
    }

    #[tokio::test]
    async fn test_unsupported_file_leaves_index_untouched() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest_file("slides.pptx", b"binary".to_vec(), DocumentKind::Upload)
            .await;
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
        assert!(pipeline.store().get_collection_info().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_file_txt() {
        let pipeline = pipeline();
        let report = pipeline
            .ingest_file(
                "photosynthesis.txt",
                b"Plants convert sunlight into glucose.".to_vec(),
                DocumentKind::Upload,
            )
            .await
            .unwrap();
        assert_eq!(report.chunks_added, 1);
        assert_eq!(report.content, "Plants convert sunlight into glucose.");
        assert_eq!(
            report.document_id,
            Document::generate_id(DocumentKind::Upload, "photosynthesis.txt")
        );
    }

    #[tokio::test]
    async fn test_ingest_batch_continues_after_failure() {
        let pipeline = pipeline();
        let docs = vec![
            text_document("empty.txt", ""),
            text_document("ok.txt", "Gravity pulls objects together."),
        ];
        let results = pipeline.ingest_batch(&docs).await;
        assert!(results[0].is_err());
        assert_eq!(*results[1].as_ref().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_corpus_skips_present_documents() {
        let pipeline = pipeline();
        let docs = vec![
            Document::seed("algebra", "mathematics", "algebra", "Variables stand for numbers."),
            Document::seed("gravity", "science", "gravity", "Mass attracts mass."),
        ];
        assert_eq!(pipeline.ensure_seed_corpus(&docs).await.unwrap(), 2);
        let count = pipeline.indexed_chunks().await.unwrap();
        assert_eq!(pipeline.ensure_seed_corpus(&docs).await.unwrap(), 0);
        assert_eq!(pipeline.indexed_chunks().await.unwrap(), count);
    }

    #[tokio::test]
    async fn test_delete_document_removes_all_chunks() {
        let pipeline = pipeline();
        let doc = text_document(
            "long.txt",
            "First sentence about cells. Second sentence about atoms. Third about stars.",
        );
        pipeline.ingest(&doc).await.unwrap();
        pipeline.delete_document(&doc.id).await.unwrap();
        assert!(!pipeline.store().contains_document(&doc.id).await.unwrap());
        assert_eq!(pipeline.indexed_chunks().await.unwrap(), 0);
    }
}
