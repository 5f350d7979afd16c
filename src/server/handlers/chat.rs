use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use tracing::info;

use crate::server::AppState;
use crate::server::protocol::{
    ApiError, ChatRequest, ChatResponse, ConversationsQuery, ConversationsResponse,
    DEFAULT_CONVERSATION_LIMIT, HealthResponse,
};

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let indexed_chunks = state
        .pipeline
        .indexed_chunks()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        indexed_chunks,
    }))
}

/// Retrieve context for the message, answer it and record the exchange.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let query = request.message.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("no message provided".to_string()));
    }

    let retrieval = state.retriever.retrieve_default(query).await?;
    let answer = state.synthesizer.synthesize(query, &retrieval).await;
    let (recorded_query, response) = (query.to_string(), answer.text.clone());
    state
        .with_store(move |store| store.record_conversation(&recorded_query, &response))
        .await?;

    info!(
        hits = retrieval.len(),
        sources = answer.sources.len(),
        fallback = answer.fallback,
        "answered chat message"
    );

    Ok(Json(ChatResponse {
        response: answer.text,
        sources: answer.sources,
    }))
}

pub async fn conversations(
    State(state): State<AppState>,
    Query(params): Query<ConversationsQuery>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_CONVERSATION_LIMIT);
    Ok(Json(ConversationsResponse {
        conversations: state
            .with_store(move |store| store.recent_conversations(limit))
            .await?,
    }))
}
