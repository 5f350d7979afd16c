//! Quiz generation and scoring.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use super::generation::TextGenerator;
use crate::error::QuizError;
use crate::models::{QuestionResult, QuizAnswers, QuizQuestion, QuizScore};

pub const MAX_QUESTIONS: u32 = 20;

static RE_JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

pub struct QuizGenerator {
    generator: Arc<dyn TextGenerator>,
    max_output_tokens: u32,
}

impl QuizGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_output_tokens: u32) -> Self {
        Self {
            generator,
            max_output_tokens,
        }
    }

    /// Ask the model for `num_questions` four-option questions about `topic`.
    pub async fn generate(
        &self,
        topic: &str,
        num_questions: u32,
    ) -> Result<Vec<QuizQuestion>, QuizError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(QuizError::InvalidRequest("topic is required".to_string()));
        }
        if !(1..=MAX_QUESTIONS).contains(&num_questions) {
            return Err(QuizError::InvalidRequest(format!(
                "num_questions must be between 1 and {}, got {}",
                MAX_QUESTIONS, num_questions
            )));
        }

        let prompt = build_quiz_prompt(topic, num_questions);
        let response = self
            .generator
            .generate(&prompt, self.max_output_tokens)
            .await?;
        debug!(chars = response.len(), "quiz response received");

        let questions = parse_questions(&response)?;
        info!(topic, requested = num_questions, received = questions.len(), "generated quiz");
        Ok(questions)
    }
}

fn build_quiz_prompt(topic: &str, num_questions: u32) -> String {
    format!(
        r#"Create a comprehensive educational quiz about {topic} with exactly {num_questions} multiple-choice questions.

Requirements:
- Each question should test understanding, not just memorization
- Include a mix of difficulty levels (easy, medium, hard)
- Provide 4 answer options (A, B, C, D) for each question
- Make sure only one answer is clearly correct
- Cover different aspects of the topic
- Questions should be educational and informative

Format your response as a JSON array with this exact structure:
[
    {{
        "question": "Question text here?",
        "options": ["A) Option 1", "B) Option 2", "C) Option 3", "D) Option 4"],
        "correct": "A) Correct option text",
        "explanation": "Brief explanation of why this answer is correct"
    }}
]

Topic: {topic}
Number of questions: {num_questions}"#
    )
}

/// Parse the first `[...]` span of a model response, or the whole text if none.
pub fn parse_questions(response: &str) -> Result<Vec<QuizQuestion>, QuizError> {
    let json = RE_JSON_ARRAY
        .find(response)
        .map_or(response, |m| m.as_str());

    let questions: Vec<QuizQuestion> =
        serde_json::from_str(json).map_err(|e| QuizError::ParseError(e.to_string()))?;

    if questions.is_empty() {
        return Err(QuizError::ParseError("no questions in response".to_string()));
    }
    Ok(questions)
}

/// Score answers keyed by question index. An answer must match `correct` exactly.
pub fn score_quiz(questions: &[QuizQuestion], answers: &QuizAnswers) -> QuizScore {
    let detailed_results: Vec<QuestionResult> = questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let user_answer = answers.get(&idx.to_string()).cloned().unwrap_or_default();
            QuestionResult {
                question: question.question.clone(),
                is_correct: user_answer == question.correct,
                user_answer,
                correct_answer: question.correct.clone(),
                explanation: question.explanation.clone(),
            }
        })
        .collect();

    let score = detailed_results.iter().filter(|r| r.is_correct).count() as u32;
    let total = questions.len() as u32;
    let percentage = if total == 0 {
        0.0
    } else {
        f64::from(score) / f64::from(total) * 100.0
    };

    QuizScore {
        score,
        total,
        percentage,
        detailed_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeGenerator;

    const RESPONSE: &str = r#"Here is your quiz:
```json
[
  {
    "question": "What is 2x = 4 solved for x?",
    "options": ["A) 1", "B) 2", "C) 3", "D) 4"],
    "correct": "B) 2",
    "explanation": "Divide both sides by 2."
  },
  {
    "question": "Which letter usually names an unknown?",
    "options": ["A) x", "B) q", "C) w", "D) k"],
    "correct": "A) x"
  }
]
```
Good luck!"#;

    fn questions() -> Vec<QuizQuestion> {
        parse_questions(RESPONSE).unwrap()
    }

    #[test]
    fn test_parse_questions_extracts_array() {
        let questions = questions();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct, "B) 2");
        assert_eq!(questions[0].options.len(), 4);
        assert_eq!(questions[1].explanation, "");
    }

    #[test]
    fn test_parse_questions_rejects_garbage() {
        assert!(matches!(
            parse_questions("I cannot make a quiz about that."),
            Err(QuizError::ParseError(_))
        ));
        assert!(matches!(parse_questions("[]"), Err(QuizError::ParseError(_))));
    }

    #[test]
    fn test_score_quiz() {
        let questions = questions();
        let mut answers = QuizAnswers::new();
        answers.insert("0".to_string(), "B) 2".to_string());
        answers.insert("1".to_string(), "C) w".to_string());

        let score = score_quiz(&questions, &answers);
        assert_eq!(score.score, 1);
        assert_eq!(score.total, 2);
        assert_eq!(score.percentage, 50.0);
        assert!(score.detailed_results[0].is_correct);
        assert!(!score.detailed_results[1].is_correct);
        assert_eq!(score.detailed_results[1].correct_answer, "A) x");
    }

    #[test]
    fn test_score_quiz_missing_answers_and_empty_quiz() {
        let score = score_quiz(&questions(), &QuizAnswers::new());
        assert_eq!(score.score, 0);
        assert_eq!(score.detailed_results[0].user_answer, "");

        let empty = score_quiz(&[], &QuizAnswers::new());
        assert_eq!(empty.total, 0);
        assert_eq!(empty.percentage, 0.0);
    }

    #[tokio::test]
    async fn test_generate_validates_request() {
        let quiz = QuizGenerator::new(Arc::new(FakeGenerator::replying(RESPONSE)), 4096);
        assert!(matches!(
            quiz.generate("  ", 5).await,
            Err(QuizError::InvalidRequest(_))
        ));
        assert!(matches!(
            quiz.generate("algebra", 0).await,
            Err(QuizError::InvalidRequest(_))
        ));
        assert!(matches!(
            quiz.generate("algebra", 21).await,
            Err(QuizError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_uses_quiz_token_budget() {
        let generator = Arc::new(FakeGenerator::replying(RESPONSE));
        let quiz = QuizGenerator::new(generator.clone(), 4096);
        let questions = quiz.generate("algebra", 2).await.unwrap();
        assert_eq!(questions.len(), 2);

        let prompts = generator.prompts();
        assert_eq!(prompts[0].1, 4096);
        assert!(prompts[0].0.contains("exactly 2 multiple-choice questions"));
        assert!(prompts[0].0.contains("Topic: algebra"));
    }

    #[tokio::test]
    async fn test_generate_propagates_generation_failure() {
        let quiz = QuizGenerator::new(Arc::new(FakeGenerator::failing()), 4096);
        assert!(matches!(
            quiz.generate("algebra", 3).await,
            Err(QuizError::GenerationError(_))
        ));
    }
}
