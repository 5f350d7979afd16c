use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::models::QuizScore;
use crate::server::AppState;
use crate::server::protocol::{
    ApiError, QuizGenerateRequest, QuizGenerateResponse, QuizHistoryResponse, QuizSubmitRequest,
};
use crate::services::score_quiz;

const HISTORY_LIMIT: usize = 10;

pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<QuizGenerateRequest>, JsonRejection>,
) -> Result<Json<QuizGenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let topic = request.topic.trim();

    let questions = state
        .quizzes
        .generate(topic, request.num_questions)
        .await?;
    let (quiz_topic, num_questions) = (topic.to_string(), request.num_questions);
    let quiz = state
        .with_store(move |store| store.insert_quiz(&quiz_topic, num_questions, &questions))
        .await?;

    Ok(Json(QuizGenerateResponse {
        quiz_id: quiz.id,
        topic: quiz.topic,
        questions: quiz.questions,
    }))
}

pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<QuizSubmitRequest>, JsonRejection>,
) -> Result<Json<QuizScore>, ApiError> {
    let Json(request) = payload?;
    let quiz_id = request
        .quiz_id
        .ok_or_else(|| ApiError::BadRequest("no quiz id provided".to_string()))?;

    let quiz = state
        .with_store(move |store| store.get_quiz(quiz_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("quiz not found".to_string()))?;

    let score = score_quiz(&quiz.questions, &request.answers);
    let score = state
        .with_store(move |store| {
            store.insert_quiz_score(quiz.id, &score)?;
            Ok(score)
        })
        .await?;

    Ok(Json(score))
}

pub async fn history(
    State(state): State<AppState>,
) -> Result<Json<QuizHistoryResponse>, ApiError> {
    Ok(Json(QuizHistoryResponse {
        quizzes: state
            .with_store(|store| store.quiz_history(HISTORY_LIMIT))
            .await?,
    }))
}
