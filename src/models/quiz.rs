//! Quiz models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One multiple-choice question as produced by the generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Must equal one of `options` exactly.
    pub correct: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub topic: String,
    pub num_questions: u32,
    pub questions: Vec<QuizQuestion>,
    pub created_date: String,
}

/// Answers keyed by question index as a string ("0", "1", ...).
pub type QuizAnswers = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizScore {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub detailed_results: Vec<QuestionResult>,
}

/// Summary row for quiz history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: i64,
    pub topic: String,
    pub num_questions: u32,
    pub created_date: String,
}
