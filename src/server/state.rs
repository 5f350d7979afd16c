use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppError, StoreError};
use crate::models::Config;
use crate::server::protocol::ApiError;
use crate::services::{
    AnswerSynthesizer, Embedder, GeminiClient, IngestionPipeline, OnnxEmbedder, QuizGenerator,
    Retriever, SpeechToText, TextChunker, TextGenerator, TextToSpeech, TutorStore, VectorStore,
    create_backend,
};

/// Shared services handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub retriever: Arc<Retriever>,
    pub synthesizer: Arc<AnswerSynthesizer>,
    pub quizzes: Arc<QuizGenerator>,
    pub store: Arc<TutorStore>,
    /// `None` when no generation API key is configured.
    pub speech: Option<Arc<dyn SpeechToText>>,
    /// `None` when no generation API key is configured.
    pub tts: Option<Arc<dyn TextToSpeech>>,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorStore>,
        generator: Arc<dyn TextGenerator>,
        speech: Option<Arc<dyn SpeechToText>>,
        tts: Option<Arc<dyn TextToSpeech>>,
        store: Arc<TutorStore>,
        uploads_dir: PathBuf,
    ) -> Self {
        let pipeline = IngestionPipeline::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            TextChunker::new(&config.indexing),
            config.embedding.batch_size as usize,
        );
        let retriever = Retriever::new(embedder, index, &config.retrieval);

        Self {
            pipeline: Arc::new(pipeline),
            retriever: Arc::new(retriever),
            synthesizer: Arc::new(AnswerSynthesizer::new(
                Arc::clone(&generator),
                &config.generation,
            )),
            quizzes: Arc::new(QuizGenerator::new(
                generator,
                config.generation.quiz_max_output_tokens,
            )),
            store,
            speech,
            tts,
            uploads_dir,
        }
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&TutorStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?
            .map_err(ApiError::from)
    }

    /// Load the embedding model, open the index and the store, and build the
    /// generation client.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let model_dir = config.model_dir();
        info!(model = %config.embedding.model_id, dir = %model_dir.display(), "loading embedding model");
        let embedder = OnnxEmbedder::load(&config.embedding, &model_dir)?;
        info!(dimension = embedder.dimension(), "embedding model loaded");

        let index = create_backend(
            &config.vector_store,
            &config.index_dir(),
            embedder.dimension() as u64,
        )
        .await?;

        let store = TutorStore::open(&config.database_path())?;
        let uploads_dir = config.uploads_dir();
        std::fs::create_dir_all(&uploads_dir)?;

        let gemini = Arc::new(GeminiClient::new(&config.generation)?);
        let (speech, tts): (Option<Arc<dyn SpeechToText>>, Option<Arc<dyn TextToSpeech>>) =
            if gemini.has_api_key() {
                (
                    Some(gemini.clone() as Arc<dyn SpeechToText>),
                    Some(gemini.clone() as Arc<dyn TextToSpeech>),
                )
            } else {
                warn!("generation API key not set; chat answers will fall back and speech is disabled");
                (None, None)
            };

        Ok(Self::new(
            config,
            Arc::new(embedder),
            index,
            gemini,
            speech,
            tts,
            Arc::new(store),
            uploads_dir,
        ))
    }
}
