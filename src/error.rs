//! Error types for the study tutor service.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("model load error: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),

    #[error("embedding task failed: {0}")]
    TaskFailed(String),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("index not initialized: {0}")]
    NotInitialized(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("storage error: {0}")]
    StorageError(#[from] rusqlite::Error),
}

/// Errors related to document ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("no text content found in document: {0}")]
    EmptyContent(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStoreError(#[from] VectorStoreError),
}

/// Errors related to retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStoreError(VectorStoreError),
}

impl From<VectorStoreError> for RetrievalError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::NotInitialized(msg) => RetrievalError::IndexUnavailable(msg),
            other => RetrievalError::VectorStoreError(other),
        }
    }
}

/// Errors related to the remote text-generation API.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation API key is not configured")]
    MissingApiKey,

    #[error("failed to connect to generation API: {0}")]
    ConnectionError(String),

    #[error("generation API error: status {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation timeout")]
    Timeout,
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::ConnectionError(_) | GenerationError::Timeout => true,
            GenerationError::ServerError { status, .. } => *status == 429 || *status >= 500,
            GenerationError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GenerationError::MissingApiKey | GenerationError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to quiz generation and scoring.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("invalid quiz request: {0}")]
    InvalidRequest(String),

    #[error("generation error: {0}")]
    GenerationError(#[from] GenerationError),

    #[error("failed to parse quiz questions: {0}")]
    ParseError(String),
}

/// Errors related to the tutor store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_initialized_maps_to_index_unavailable() {
        let err: RetrievalError = VectorStoreError::NotInitialized("chunks".to_string()).into();
        assert!(matches!(err, RetrievalError::IndexUnavailable(_)));

        let err: RetrievalError = VectorStoreError::SearchError("boom".to_string()).into();
        assert!(matches!(err, RetrievalError::VectorStoreError(_)));
    }

    #[test]
    fn test_generation_error_retryable() {
        assert!(GenerationError::Timeout.is_retryable());
        assert!(GenerationError::ConnectionError("refused".to_string()).is_retryable());
        assert!(
            GenerationError::ServerError {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_retryable()
        );
        assert!(
            GenerationError::ServerError {
                status: 429,
                message: "quota".to_string()
            }
            .is_retryable()
        );
        assert!(
            !GenerationError::ServerError {
                status: 400,
                message: "bad request".to_string()
            }
            .is_retryable()
        );
        assert!(!GenerationError::MissingApiKey.is_retryable());
        assert!(!GenerationError::InvalidResponse("empty".to_string()).is_retryable());
    }
}
