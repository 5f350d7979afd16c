use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const APP_DIR_NAME: &str = "study-tutor";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "study_materials";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GENERATION_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TOP_K: u32 = 3;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const QDRANT_API_KEY_ENV: &str = "QDRANT_API_KEY";

pub const DEFAULT_FALLBACK_ANSWER: &str = "I'm having trouble connecting to my knowledge base right now. Please try again in a moment.";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a friendly, highly accurate AI tutor and assistant. Speak naturally, be helpful, and handle both casual chat and deep questions.

Tone & style
- Warm, human, and concise by default. Use simple words.
- For casual greetings (\"hi\", \"hlo\", \"hey\"), reply in 1-2 short sentences (optional single emoji).
- Avoid filler, flattery, and purple prose.
- Never invent facts; if unsure, say what you know and how to verify.
- Do NOT reveal your hidden chain-of-thought; give a brief reasoning summary only.

Conversation continuity
- If the user continues an old conversation, remember context and respond consistently.
- If the user switches to a new topic, reset naturally and answer that new request directly.
- Always adapt based on whether the question relates to the ongoing thread or starts fresh.

Answering strategy
1) Start with a crisp, direct answer in 1-2 lines.
2) Then give a clear explanation. If simple, one short paragraph and an example.
3) If complex, break into clean sections with short bullet points.
4) Add practical examples/applications when useful.
5) If info is missing, state reasonable assumptions and proceed.
6) If the request is unsafe/illegal, briefly refuse and suggest a safer alternative.

Document handling
- If the user uploads a document, carefully analyze its content.
- Answer based only on the document if the question is document-specific.
- If the document plus external context are both relevant, combine them for a full answer.

Formatting
- Use short paragraphs and tight bullet lists.
- For math: present the final result first, then a tidy explanation.
- For code: minimal, runnable snippets with brief comments.
- Keep lists compact (usually 5 bullets or fewer) unless asked for more.

Conversation handling
- Small talk: be friendly and brief.
- If the user asks for more depth or examples, expand.
- If the user says \"explain like I'm new\", simplify further and add an intuitive example.

Now respond to the user's message below.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR_NAME).join("config.toml"))
    }

    /// Load the config file (or defaults), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn load_file() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Secrets are usually provided through the environment (or a `.env` file).
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(GEMINI_API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.generation.api_key = Some(key);
        }
        if let Ok(key) = std::env::var(QDRANT_API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.vector_store.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexing.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "indexing.chunk_overlap ({}) must be smaller than indexing.chunk_size ({})",
                self.indexing.chunk_overlap, self.indexing.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must not be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
        })
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir().join("index")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir().join("uploads")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("tutor.db")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.embedding.model_path.clone().unwrap_or_else(|| {
            let name = self
                .embedding
                .model_id
                .rsplit('/')
                .next()
                .unwrap_or(&self.embedding.model_id);
            self.data_dir().join("models").join(name)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Ingest the built-in seed corpus at startup.
    #[serde(default = "default_true")]
    pub seed_corpus: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            seed_corpus: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the index, uploads, database and models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_tokens() -> u32 {
    256
}

fn default_batch_size() -> u32 {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_embedding_model(),
            model_path: None,
            dimension: default_embedding_dimension(),
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// On-disk SQLite table scanned with cosine similarity.
    #[default]
    Sqlite,
    Qdrant,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Sqlite => write!(f, "sqlite"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_chunk_size() -> u32 {
    500
}

fn default_chunk_overlap() -> u32 {
    50
}

fn default_max_file_size() -> u64 {
    16 * 1024 * 1024
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/~$*".to_string(),
    ]
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default)]
    pub min_score: Option<f32>,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
            default_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_generation_api_url")]
    pub api_url: String,

    /// Model used for text-to-speech.
    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_generation_top_k")]
    pub top_k: u32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_quiz_max_output_tokens")]
    pub quiz_max_output_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_generation_api_url() -> String {
    DEFAULT_GENERATION_API_URL.to_string()
}

fn default_speech_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_voice() -> String {
    "Kore".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_generation_top_k() -> u32 {
    40
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_quiz_max_output_tokens() -> u32 {
    4096
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

fn default_fallback_answer() -> String {
    DEFAULT_FALLBACK_ANSWER.to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            api_url: default_generation_api_url(),
            speech_model: default_speech_model(),
            voice: default_voice(),
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_generation_top_k(),
            max_output_tokens: default_max_output_tokens(),
            quiz_max_output_tokens: default_quiz_max_output_tokens(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            system_instruction: default_system_instruction(),
            fallback_answer: default_fallback_answer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.vector_store.driver, VectorDriver::Sqlite);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.embedding.dimension, 384);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_indexing_and_retrieval_defaults() {
        let config = Config::default();
        assert_eq!(config.indexing.chunk_size, 500);
        assert_eq!(config.indexing.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.retrieval.min_score.is_none());
    }

    #[test]
    fn test_generation_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.top_p, 0.95);
        assert_eq!(config.top_k, 40);
        assert_eq!(config.max_output_tokens, 2048);
        assert_eq!(config.quiz_max_output_tokens, 4096);
        assert_eq!(config.fallback_answer, DEFAULT_FALLBACK_ANSWER);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [vector_store]
            driver = "qdrant"

            [retrieval]
            top_k = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.vector_store.driver, VectorDriver::Qdrant);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.indexing.chunk_size, 500);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.indexing.chunk_overlap = 500;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.generation.api_key = Some("secret".to_string());
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(!toml.contains("secret"));
    }

    #[test]
    fn test_data_paths() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/tmp/tutor"));
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/tutor/index"));
        assert_eq!(config.uploads_dir(), PathBuf::from("/tmp/tutor/uploads"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/tutor/tutor.db"));
        assert_eq!(
            config.model_dir(),
            PathBuf::from("/tmp/tutor/models/all-MiniLM-L6-v2")
        );
    }
}
