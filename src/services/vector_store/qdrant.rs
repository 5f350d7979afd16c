//! Qdrant vector store backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};

use super::{CollectionInfo, VectorStore, rank_results};
use crate::error::VectorStoreError;
use crate::models::{
    DocumentChunk, DocumentKind, DocumentMetadata, SearchResult, VectorStoreConfig,
};

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    fn document_filter(document_ids: &[String]) -> Filter {
        Filter::should(
            document_ids
                .iter()
                .map(|id| Condition::matches("document_id", id.clone()))
                .collect::<Vec<_>>(),
        )
    }
}

fn is_missing_collection(msg: &str) -> bool {
    msg.contains("not found") || msg.contains("doesn't exist") || msg.contains("does not exist")
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::IntegerValue(n)) => Some(*n),
        _ => None,
    })
}

fn point_id_string(id: Option<&PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn chunk_payload(chunk: DocumentChunk) -> (String, Vec<f32>, HashMap<String, Value>) {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("document_id".to_string(), chunk.document_id.into());
    payload.insert("document_name".to_string(), chunk.document_name.into());
    payload.insert(
        "chunk_index".to_string(),
        i64::from(chunk.chunk_index).into(),
    );
    payload.insert(
        "total_chunks".to_string(),
        i64::from(chunk.total_chunks).into(),
    );
    payload.insert("content".to_string(), chunk.content.into());
    payload.insert("kind".to_string(), chunk.kind.to_string().into());
    payload.insert("created_at".to_string(), chunk.created_at.into());
    payload.insert(
        "size_bytes".to_string(),
        (chunk.metadata.size_bytes as i64).into(),
    );
    if let Some(subject) = chunk.metadata.subject {
        payload.insert("subject".to_string(), subject.into());
    }
    if let Some(topic) = chunk.metadata.topic {
        payload.insert("topic".to_string(), topic.into());
    }
    if let Some(filename) = chunk.metadata.filename {
        payload.insert("filename".to_string(), filename.into());
    }
    (chunk.id, chunk.dense_vector, payload)
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if is_missing_collection(&msg) {
                    Ok(None)
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        if self.get_collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let (id, vector, payload) = chunk_payload(chunk);
                PointStruct::new(id, vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client.upsert_points(upsert).await.map_err(|e| {
            let msg = e.to_string();
            if is_missing_collection(&msg) {
                VectorStoreError::NotInitialized(msg)
            } else {
                VectorStoreError::UpsertError(msg)
            }
        })?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit).with_payload(true);

        if let Some(score) = min_score {
            search_builder = search_builder.score_threshold(score);
        }

        let response = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if is_missing_collection(&msg) {
                    VectorStoreError::NotInitialized(msg)
                } else {
                    VectorStoreError::SearchError(msg)
                }
            })?;

        let mut results: Vec<SearchResult> = response
            .result
            .into_iter()
            .map(|point| {
                let payload = &point.payload;
                let kind = match payload_str(payload, "kind").as_deref() {
                    Some("seed") => DocumentKind::Seed,
                    _ => DocumentKind::Upload,
                };

                SearchResult {
                    chunk_id: point_id_string(point.id.as_ref()),
                    score: point.score,
                    content: payload_str(payload, "content").unwrap_or_default(),
                    document_id: payload_str(payload, "document_id").unwrap_or_default(),
                    document_name: payload_str(payload, "document_name").unwrap_or_default(),
                    chunk_index: payload_int(payload, "chunk_index").unwrap_or(0) as u32,
                    kind,
                    metadata: DocumentMetadata {
                        subject: payload_str(payload, "subject"),
                        topic: payload_str(payload, "topic"),
                        filename: payload_str(payload, "filename"),
                        size_bytes: payload_int(payload, "size_bytes").unwrap_or(0) as u64,
                    },
                }
            })
            .collect();

        rank_results(&mut results);
        Ok(results)
    }

    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let points = PointsIdsList {
            ids: ids.iter().map(|id| PointId::from(id.clone())).collect(),
        };
        let delete = DeletePointsBuilder::new(&self.collection)
            .points(points)
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let delete = DeletePointsBuilder::new(&self.collection)
            .points(Self::document_filter(document_ids))
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn contains_document(&self, document_id: &str) -> Result<bool, VectorStoreError> {
        let count = CountPointsBuilder::new(&self.collection)
            .filter(Filter::must([Condition::matches(
                "document_id",
                document_id.to_string(),
            )]))
            .exact(true);

        let response = self
            .client
            .count(count)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(response.result.is_some_and(|r| r.count > 0))
    }

    async fn clear_collection(&self) -> Result<(), VectorStoreError> {
        if self.get_collection_info().await?.is_none() {
            return Ok(());
        }

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        self.create_collection().await?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_payload() {
        let chunk = DocumentChunk {
            id: DocumentChunk::generate_id("doc", 0),
            document_id: "doc".to_string(),
            document_name: "Algebra".to_string(),
            content: "x + 1 = 2".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            start_offset: 0,
            end_offset: 9,
            dense_vector: vec![0.1, 0.2],
            kind: DocumentKind::Seed,
            metadata: DocumentMetadata {
                subject: Some("mathematics".to_string()),
                topic: Some("algebra".to_string()),
                filename: None,
                size_bytes: 9,
            },
            created_at: "now".to_string(),
        };

        let (id, vector, payload) = chunk_payload(chunk);
        assert_eq!(id, DocumentChunk::generate_id("doc", 0));
        assert_eq!(vector, vec![0.1, 0.2]);
        assert_eq!(payload_str(&payload, "document_name").as_deref(), Some("Algebra"));
        assert_eq!(payload_str(&payload, "kind").as_deref(), Some("seed"));
        assert_eq!(payload_str(&payload, "subject").as_deref(), Some("mathematics"));
        assert_eq!(payload_int(&payload, "size_bytes"), Some(9));
        assert!(payload_str(&payload, "filename").is_none());
    }

    #[test]
    fn test_missing_collection_detection() {
        assert!(is_missing_collection("Collection `x` not found"));
        assert!(is_missing_collection("collection doesn't exist"));
        assert!(!is_missing_collection("timeout"));
    }

    #[test]
    fn test_document_filter_matches_any_id() {
        let filter = QdrantBackend::document_filter(&["a".to_string(), "b".to_string()]);
        assert_eq!(filter.should.len(), 2);
        assert!(filter.must.is_empty());
    }
}
