//! Request and response bodies for the HTTP API, and its error type.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::error::{GenerationError, IngestError, QuizError, RetrievalError, StoreError};
use crate::models::{Conversation, QuizAnswers, QuizQuestion, QuizSummary, UploadedDocument};

pub const DEFAULT_NUM_QUESTIONS: u32 = 5;
pub const DEFAULT_CONVERSATION_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub indexed_chunks: u64,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

/// Per-file upload outcome.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResult {
    Ingested {
        filename: String,
        chunks_added: usize,
        file_size: u64,
    },
    Failed {
        filename: String,
        error: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub results: Vec<UploadResult>,
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<UploadedDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuizGenerateRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_num_questions")]
    pub num_questions: u32,
}

fn default_num_questions() -> u32 {
    DEFAULT_NUM_QUESTIONS
}

#[derive(Debug, Serialize)]
pub struct QuizGenerateResponse {
    pub quiz_id: i64,
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct QuizSubmitRequest {
    pub quiz_id: Option<i64>,
    #[serde(default)]
    pub answers: QuizAnswers,
}

#[derive(Debug, Serialize)]
pub struct QuizHistoryResponse {
    pub quizzes: Vec<QuizSummary>,
}

#[derive(Debug, Deserialize)]
pub struct StudyStartRequest {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct StudyStartResponse {
    pub success: bool,
    pub session_id: i64,
    pub topic: String,
    pub start_time: String,
}

#[derive(Debug, Serialize)]
pub struct StudyStopResponse {
    pub success: bool,
    pub duration: i64,
    pub duration_formatted: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: i64,
    pub topic: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration: i64,
    pub duration_formatted: String,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SynthesisRequest {
    #[serde(default)]
    pub text: String,
}

/// Base64 audio for the client to play.
#[derive(Debug, Serialize)]
pub struct SynthesisResponse {
    pub success: bool,
    pub audio: String,
    pub mime_type: String,
}

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("invalid multipart body: {}", err))
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidQuery(msg) => ApiError::BadRequest(msg),
            RetrievalError::IndexUnavailable(msg) => {
                ApiError::Unavailable(format!("knowledge base unavailable: {}", msg))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(format!("failed to generate quiz questions: {}", other)),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFormat(_)
            | IngestError::EmptyContent(_)
            | IngestError::ExtractionFailed(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::MissingApiKey => {
                ApiError::Unavailable("speech recognition not available".to_string())
            }
            GenerationError::InvalidResponse(_) => {
                ApiError::BadRequest("could not understand audio".to_string())
            }
            other => ApiError::Internal(format!("speech recognition service error: {}", other)),
        }
    }
}
