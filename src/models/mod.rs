mod config;
mod document;
mod quiz;
mod records;
mod search;
mod study;

pub use config::{
    APP_DIR_NAME, Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_FALLBACK_ANSWER, DEFAULT_GENERATION_MODEL, DEFAULT_QDRANT_URL,
    DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_TOP_K, EmbeddingConfig, GEMINI_API_KEY_ENV,
    GenerationConfig, IndexingConfig, RetrievalConfig, ServerConfig, StorageConfig, VectorDriver,
    VectorStoreConfig,
};
pub use document::{Document, DocumentChunk, DocumentFormat, DocumentKind, DocumentMetadata};
pub use quiz::{QuestionResult, Quiz, QuizAnswers, QuizQuestion, QuizScore, QuizSummary};
pub use records::{Conversation, UploadedDocument};
pub use search::{Answer, OutputFormat, RetrievalResult, SearchResult};
pub use study::{Activity, ActivityKind, ProgressReport, StudySession, format_duration};
