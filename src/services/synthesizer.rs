//! Answer synthesis from retrieved context.

use std::sync::Arc;

use tracing::{debug, warn};

use super::generation::TextGenerator;
use crate::models::{Answer, GenerationConfig, RetrievalResult};

const QA_INSTRUCTION: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Turns a query plus retrieved chunks into an answer with sources.
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
    config: GenerationConfig,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            config: config.clone(),
        }
    }

    /// Persona instruction, then every retrieved chunk, then the question.
    pub fn build_prompt(&self, query: &str, retrieval: &RetrievalResult) -> String {
        let context = retrieval
            .hits
            .iter()
            .map(|hit| hit.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\nUser message: {}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
            self.config.system_instruction.trim_end(),
            QA_INSTRUCTION,
            context,
            query
        )
    }

    /// Never fails: a generation error yields the fallback answer with no sources.
    pub async fn synthesize(&self, query: &str, retrieval: &RetrievalResult) -> Answer {
        let prompt = self.build_prompt(query, retrieval);
        debug!(
            hits = retrieval.len(),
            prompt_chars = prompt.len(),
            "synthesizing answer"
        );

        match self
            .generator
            .generate(&prompt, self.config.max_output_tokens)
            .await
        {
            Ok(text) => Answer {
                text,
                sources: retrieval.source_names(),
                fallback: false,
            },
            Err(e) => {
                warn!(error = %e, "generation failed, returning fallback answer");
                Answer {
                    text: self.config.fallback_answer.clone(),
                    sources: Vec::new(),
                    fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_FALLBACK_ANSWER, DocumentKind, DocumentMetadata, SearchResult};
    use crate::services::testing::FakeGenerator;

    fn retrieval() -> RetrievalResult {
        let hit = |id: &str, name: &str, content: &str, score: f32| SearchResult {
            chunk_id: id.to_string(),
            score,
            content: content.to_string(),
            document_id: name.to_string(),
            document_name: name.to_string(),
            chunk_index: 0,
            kind: DocumentKind::Seed,
            metadata: DocumentMetadata::default(),
        };
        RetrievalResult::new(
            "What is F = ma?",
            vec![
                hit("1", "physics", "Newton's Second Law gives us F = ma.", 0.9),
                hit("2", "gravity", "Gravity attracts objects.", 0.6),
                hit("3", "physics", "Inertia keeps objects moving.", 0.5),
            ],
            3,
        )
    }

    #[test]
    fn test_prompt_contains_persona_context_and_query() {
        let synthesizer = AnswerSynthesizer::new(
            Arc::new(FakeGenerator::replying("ok")),
            &GenerationConfig::default(),
        );
        let prompt = synthesizer.build_prompt("What is F = ma?", &retrieval());

        assert!(prompt.starts_with("You are a friendly"));
        assert!(prompt.contains("Now respond to the user's message below.\n\nUser message: Use the following pieces of context"));
        assert!(prompt.contains(
            "Newton's Second Law gives us F = ma.\n\nGravity attracts objects.\n\nInertia keeps objects moving."
        ));
        assert!(prompt.ends_with("Question: What is F = ma?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn test_synthesize_returns_distinct_sources() {
        let generator = Arc::new(FakeGenerator::replying("Force equals mass times acceleration."));
        let synthesizer = AnswerSynthesizer::new(generator.clone(), &GenerationConfig::default());

        let answer = synthesizer.synthesize("What is F = ma?", &retrieval()).await;
        assert_eq!(answer.text, "Force equals mass times acceleration.");
        assert_eq!(answer.sources, vec!["physics", "gravity"]);
        assert!(!answer.fallback);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1, 2048);
    }

    #[tokio::test]
    async fn test_generation_failure_yields_fallback() {
        let synthesizer = AnswerSynthesizer::new(
            Arc::new(FakeGenerator::failing()),
            &GenerationConfig::default(),
        );
        let answer = synthesizer.synthesize("What is F = ma?", &retrieval()).await;
        assert_eq!(answer.text, DEFAULT_FALLBACK_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(answer.fallback);
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_asks_model() {
        let synthesizer = AnswerSynthesizer::new(
            Arc::new(FakeGenerator::replying("hello!")),
            &GenerationConfig::default(),
        );
        let answer = synthesizer
            .synthesize("hi", &RetrievalResult::new("hi", vec![], 0))
            .await;
        assert_eq!(answer.text, "hello!");
        assert!(answer.sources.is_empty());
    }
}
