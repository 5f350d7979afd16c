//! Embedded vector store: chunks and their vectors in a SQLite file, searched by
//! a full cosine scan.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::{CollectionInfo, VectorStore, cosine_similarity, rank_results};
use crate::error::VectorStoreError;
use crate::models::{DocumentChunk, DocumentKind, DocumentMetadata, SearchResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT NOT NULL,
    collection TEXT NOT NULL,
    document_id TEXT NOT NULL,
    document_name TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(collection, document_id);
"#;

pub struct SqliteBackend {
    inner: Arc<Inner>,
}

/// Connection state shared with blocking tasks.
struct Inner {
    conn: Mutex<Connection>,
    collection: String,
    dimension: usize,
}

impl SqliteBackend {
    /// Open (or create) `vectors.db` inside `dir`.
    pub fn open(dir: &Path, collection: &str, dimension: u64) -> Result<Self, VectorStoreError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            VectorStoreError::ConnectionError(format!(
                "failed to create index directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let conn = Connection::open(dir.join("vectors.db"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn, collection, dimension)
    }

    pub fn in_memory(collection: &str, dimension: u64) -> Result<Self, VectorStoreError> {
        Self::with_connection(Connection::open_in_memory()?, collection, dimension)
    }

    fn with_connection(
        conn: Connection,
        collection: &str,
        dimension: u64,
    ) -> Result<Self, VectorStoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                collection: collection.to_string(),
                dimension: dimension as usize,
            }),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T, VectorStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Inner, &mut Connection) -> Result<T, VectorStoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut conn = inner.lock()?;
            op(inner.as_ref(), &mut *conn)
        })
        .await
        .map_err(|e| VectorStoreError::ConnectionError(format!("index task failed: {e}")))?
    }
}

impl Inner {
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, VectorStoreError> {
        self.conn
            .lock()
            .map_err(|_| VectorStoreError::ConnectionError("index lock poisoned".to_string()))
    }

    fn stored_dimension(&self, conn: &Connection) -> Result<Option<usize>, VectorStoreError> {
        let dimension: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?1",
                params![self.collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dimension.map(|d| d as usize))
    }

    fn require_collection(&self, conn: &Connection) -> Result<(), VectorStoreError> {
        match self.stored_dimension(conn)? {
            Some(_) => Ok(()),
            None => Err(VectorStoreError::NotInitialized(format!(
                "collection '{}' does not exist",
                self.collection
            ))),
        }
    }

    fn check_dimensions(&self, chunks: &[DocumentChunk]) -> Result<(), VectorStoreError> {
        for chunk in chunks {
            if chunk.dense_vector.len() != self.dimension {
                return Err(VectorStoreError::UpsertError(format!(
                    "chunk {} has {} dimensions, expected {}",
                    chunk.id,
                    chunk.dense_vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    fn insert_chunks(
        &self,
        tx: &Transaction<'_>,
        chunks: &[DocumentChunk],
    ) -> Result<(), VectorStoreError> {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO chunks (
                id, collection, document_id, document_name, chunk_index, total_chunks,
                start_offset, end_offset, kind, content, metadata, created_at, embedding
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for chunk in chunks {
            let metadata = serde_json::to_string(&chunk.metadata)
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
            stmt.execute(params![
                chunk.id,
                self.collection,
                chunk.document_id,
                chunk.document_name,
                chunk.chunk_index,
                chunk.total_chunks,
                chunk.start_offset as i64,
                chunk.end_offset as i64,
                chunk.kind.to_string(),
                chunk.content,
                metadata,
                chunk.created_at,
                encode_vector(&chunk.dense_vector),
            ])?;
        }
        Ok(())
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn parse_kind(kind: &str) -> DocumentKind {
    match kind {
        "seed" => DocumentKind::Seed,
        _ => DocumentKind::Upload,
    }
}

#[async_trait]
impl VectorStore for SqliteBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.run(|_, conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(true)
        })
        .await
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        self.run(|inner, conn| {
            if inner.stored_dimension(conn)?.is_none() {
                return Ok(None);
            }
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
                params![inner.collection],
                |row| row.get(0),
            )?;
            Ok(Some(CollectionInfo {
                points_count: count as u64,
            }))
        })
        .await
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        self.run(|inner, conn| match inner.stored_dimension(conn)? {
            Some(existing) if existing != inner.dimension => {
                Err(VectorStoreError::CollectionError(format!(
                    "collection '{}' was built with {} dimensions, the embedding model produces {}",
                    inner.collection, existing, inner.dimension
                )))
            }
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO collections (name, dimension, created_at) VALUES (?1, ?2, ?3)",
                    params![
                        inner.collection,
                        inner.dimension as i64,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(())
            }
        })
        .await
    }

    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        self.run(move |inner, conn| {
            inner.require_collection(conn)?;
            inner.check_dimensions(&chunks)?;

            let tx = conn.transaction()?;
            inner.insert_chunks(&tx, &chunks)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Delete and insert inside one transaction, so a failed write keeps the old chunks.
    async fn replace_document(
        &self,
        document_id: &str,
        chunks: Vec<DocumentChunk>,
    ) -> Result<(), VectorStoreError> {
        let document_id = document_id.to_string();
        self.run(move |inner, conn| {
            inner.require_collection(conn)?;
            inner.check_dimensions(&chunks)?;

            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM chunks WHERE collection = ?1 AND document_id = ?2",
                params![inner.collection, document_id],
            )
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
            inner.insert_chunks(&tx, &chunks)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        self.run(move |inner, conn| {
            inner.require_collection(conn)?;

            if query_vector.len() != inner.dimension {
                return Err(VectorStoreError::SearchError(format!(
                    "query has {} dimensions, expected {}",
                    query_vector.len(),
                    inner.dimension
                )));
            }

            let mut stmt = conn.prepare(
                "SELECT id, document_id, document_name, chunk_index, kind, content, metadata, embedding
                 FROM chunks WHERE collection = ?1",
            )?;
            let rows = stmt.query_map(params![inner.collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Vec<u8>>(7)?,
                ))
            })?;

            let mut results = Vec::new();
            for row in rows {
                let (chunk_id, document_id, document_name, chunk_index, kind, content, metadata, blob) =
                    row?;
                let score = cosine_similarity(&query_vector, &decode_vector(&blob));
                if min_score.is_some_and(|min| score < min) {
                    continue;
                }
                results.push(SearchResult {
                    chunk_id,
                    score,
                    content,
                    document_id,
                    document_name,
                    chunk_index,
                    kind: parse_kind(&kind),
                    metadata: serde_json::from_str::<DocumentMetadata>(&metadata)
                        .unwrap_or_default(),
                });
            }

            rank_results(&mut results);
            results.truncate(limit as usize);
            Ok(results)
        })
        .await
    }

    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let ids = ids.to_vec();
        self.run(move |inner, conn| {
            let tx = conn.transaction()?;
            for id in &ids {
                tx.execute(
                    "DELETE FROM chunks WHERE collection = ?1 AND id = ?2",
                    params![inner.collection, id],
                )
                .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        let document_ids = document_ids.to_vec();
        self.run(move |inner, conn| {
            let tx = conn.transaction()?;
            for document_id in &document_ids {
                tx.execute(
                    "DELETE FROM chunks WHERE collection = ?1 AND document_id = ?2",
                    params![inner.collection, document_id],
                )
                .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn contains_document(&self, document_id: &str) -> Result<bool, VectorStoreError> {
        let document_id = document_id.to_string();
        self.run(move |inner, conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM chunks WHERE collection = ?1 AND document_id = ?2 LIMIT 1",
                    params![inner.collection, document_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(exists.is_some())
        })
        .await
    }

    async fn clear_collection(&self) -> Result<(), VectorStoreError> {
        self.run(|inner, conn| {
            conn.execute(
                "DELETE FROM chunks WHERE collection = ?1",
                params![inner.collection],
            )
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
            Ok(())
        })
        .await
    }

    fn collection(&self) -> &str {
        &self.inner.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(document_id: &str, index: u32, content: &str, vector: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            id: DocumentChunk::generate_id(document_id, index),
            document_id: document_id.to_string(),
            document_name: format!("{document_id}.txt"),
            content: content.to_string(),
            chunk_index: index,
            total_chunks: 1,
            start_offset: 0,
            end_offset: content.len() as u64,
            dense_vector: vector,
            kind: DocumentKind::Upload,
            metadata: DocumentMetadata {
                filename: Some(format!("{document_id}.txt")),
                ..Default::default()
            },
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    async fn store_with_points() -> SqliteBackend {
        let store = SqliteBackend::in_memory("test", 3).unwrap();
        store.create_collection().await.unwrap();
        store
            .upsert_points(vec![
                chunk("a", 0, "north", vec![1.0, 0.0, 0.0]),
                chunk("a", 1, "north-east", vec![0.7, 0.7, 0.0]),
                chunk("b", 0, "east", vec![0.0, 1.0, 0.0]),
                chunk("c", 0, "up", vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_vector_blob_encoding() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)), v);
    }

    #[tokio::test]
    async fn test_search_before_create_is_not_initialized() {
        let store = SqliteBackend::in_memory("test", 3).unwrap();
        let result = store.search(vec![1.0, 0.0, 0.0], 3, None).await;
        assert!(matches!(result, Err(VectorStoreError::NotInitialized(_))));
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = store_with_points().await;
        let results = store.search(vec![1.0, 0.1, 0.0], 3, None).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].content, "north");
        assert_eq!(results[1].content, "north-east");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results[0].metadata.filename.as_deref(), Some("a.txt"));
    }

    #[tokio::test]
    async fn test_search_min_score_and_limit() {
        let store = store_with_points().await;
        let results = store
            .search(vec![1.0, 0.0, 0.0], 10, Some(0.5))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = store.search(vec![1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = store_with_points().await;
        store
            .upsert_points(vec![chunk("b", 0, "east again", vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();
        let info = store.get_collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 4);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let store = store_with_points().await;
        let result = store
            .upsert_points(vec![chunk("d", 0, "bad", vec![1.0, 0.0])])
            .await;
        assert!(matches!(result, Err(VectorStoreError::UpsertError(_))));
    }

    #[tokio::test]
    async fn test_delete_by_document_ids() {
        let store = store_with_points().await;
        assert!(store.contains_document("a").await.unwrap());

        store
            .delete_by_document_ids(&["a".to_string()])
            .await
            .unwrap();

        assert!(!store.contains_document("a").await.unwrap());
        let info = store.get_collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 2);
    }

    #[tokio::test]
    async fn test_replace_document_swaps_chunks() {
        let store = store_with_points().await;
        store
            .replace_document("a", vec![chunk("a", 0, "north again", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let info = store.get_collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 3);
        let results = store.search(vec![1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].content, "north again");
    }

    #[tokio::test]
    async fn test_replace_document_keeps_old_chunks_on_bad_input() {
        let store = store_with_points().await;
        let result = store
            .replace_document("a", vec![chunk("a", 0, "bad", vec![1.0, 0.0])])
            .await;
        assert!(matches!(result, Err(VectorStoreError::UpsertError(_))));

        assert!(store.contains_document("a").await.unwrap());
        let info = store.get_collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_searches_share_connection() {
        let store = Arc::new(store_with_points().await);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.search(vec![0.0, 1.0, 0.0], 1, None).await })
            })
            .collect();

        for handle in handles {
            let results = handle.await.unwrap().unwrap();
            assert_eq!(results[0].content, "east");
        }
    }

    #[tokio::test]
    async fn test_delete_points_and_clear() {
        let store = store_with_points().await;
        store
            .delete_points(&[DocumentChunk::generate_id("c", 0)])
            .await
            .unwrap();
        assert!(!store.contains_document("c").await.unwrap());

        store.clear_collection().await.unwrap();
        let info = store.get_collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteBackend::open(dir.path(), "test", 3).unwrap();
            store.create_collection().await.unwrap();
            store
                .upsert_points(vec![chunk("a", 0, "kept", vec![1.0, 0.0, 0.0])])
                .await
                .unwrap();
        }
        let store = SqliteBackend::open(dir.path(), "test", 3).unwrap();
        let results = store.search(vec![1.0, 0.0, 0.0], 3, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "kept");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        SqliteBackend::open(dir.path(), "test", 3)
            .unwrap()
            .create_collection()
            .await
            .unwrap();
        let store = SqliteBackend::open(dir.path(), "test", 4).unwrap();
        assert!(matches!(
            store.create_collection().await,
            Err(VectorStoreError::CollectionError(_))
        ));
    }
}
