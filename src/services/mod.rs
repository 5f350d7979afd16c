mod chunker;
mod embedding;
mod extract;
mod generation;
mod pipeline;
mod quiz;
mod retriever;
mod seed;
mod store;
mod synthesizer;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{TextChunker, TextSpan, split};
pub use embedding::{Embedder, EmbeddingModel, OnnxEmbedder};
pub use extract::{docx_xml_to_text, extract_text, extract_text_blocking};
pub use generation::{
    GeminiClient, SpeechToText, SynthesizedSpeech, TextGenerator, TextToSpeech,
};
pub use pipeline::{IngestReport, IngestionPipeline};
pub use quiz::{MAX_QUESTIONS, QuizGenerator, parse_questions, score_quiz};
pub use retriever::Retriever;
pub use seed::seed_documents;
pub use store::{TutorStore, timestamp_now};
pub use synthesizer::AnswerSynthesizer;
pub use vector_store::{
    CollectionInfo, QdrantBackend, SqliteBackend, VectorStore, create_backend,
};
