//! Deterministic stand-ins for the embedding model and generation API.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::embedding::{Embedder, normalize};
use super::generation::{SpeechToText, SynthesizedSpeech, TextGenerator, TextToSpeech};
use crate::error::{EmbeddingError, GenerationError};

/// Hashed bag-of-words embedding: texts sharing words score higher.
pub struct HashEmbedder {
    dimension: usize,
    failing: AtomicBool,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every following call fail with an inference error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&hash[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            vector[idx] += 1.0;
        }
        normalize(&vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::InferenceError("model unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "hash-bow"
    }
}

/// Replies with a fixed text, or fails every call when built with `failing()`.
pub struct FakeGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<(String, u32)>>,
}

impl FakeGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far with their token budgets.
    pub fn prompts(&self) -> Vec<(String, u32)> {
        self.prompts.lock().unwrap().clone()
    }

    fn respond(&self) -> Result<String, GenerationError> {
        self.reply
            .clone()
            .ok_or_else(|| GenerationError::ConnectionError("connection refused".to_string()))
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_output_tokens));
        self.respond()
    }
}

#[async_trait]
impl SpeechToText for FakeGenerator {
    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String, GenerationError> {
        self.respond()
    }
}

#[async_trait]
impl TextToSpeech for FakeGenerator {
    /// Speaks the configured reply as its UTF-8 bytes.
    async fn synthesize(&self, _text: &str) -> Result<SynthesizedSpeech, GenerationError> {
        Ok(SynthesizedSpeech {
            audio: self.respond()?.into_bytes(),
            mime_type: "audio/wav".to_string(),
        })
    }
}
