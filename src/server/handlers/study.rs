use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use tracing::info;

use crate::models::format_duration;
use crate::server::AppState;
use crate::server::protocol::{
    ApiError, SessionView, SessionsResponse, StudyStartRequest, StudyStartResponse,
    StudyStopResponse,
};

const SESSIONS_LIMIT: usize = 10;

pub async fn start(
    State(state): State<AppState>,
    payload: Result<Json<StudyStartRequest>, JsonRejection>,
) -> Result<Json<StudyStartResponse>, ApiError> {
    let Json(request) = payload?;
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("no topic provided".to_string()));
    }

    let session_topic = topic.to_string();
    let session = state
        .with_store(move |store| store.start_study_session(&session_topic))
        .await?;
    info!(session.id = session.id, topic, "study session started");

    Ok(Json(StudyStartResponse {
        success: true,
        session_id: session.id,
        topic: session.topic,
        start_time: session.start_time,
    }))
}

pub async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudyStopResponse>, ApiError> {
    let not_found = || ApiError::NotFound("study session not found".to_string());

    let id: i64 = id.parse().map_err(|_| not_found())?;
    let session = state
        .with_store(move |store| store.stop_study_session(id))
        .await?
        .ok_or_else(not_found)?;
    let duration = session.duration.unwrap_or(0);
    info!(session.id = id, duration, "study session stopped");

    Ok(Json(StudyStopResponse {
        success: true,
        duration,
        duration_formatted: format_duration(duration),
    }))
}

pub async fn sessions(State(state): State<AppState>) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state
        .with_store(|store| store.completed_sessions(SESSIONS_LIMIT))
        .await?
        .into_iter()
        .map(|session| {
            let duration = session.duration.unwrap_or(0);
            SessionView {
                id: session.id,
                topic: session.topic,
                start_time: session.start_time,
                end_time: session.end_time,
                duration,
                duration_formatted: format_duration(duration),
            }
        })
        .collect();

    Ok(Json(SessionsResponse { sessions }))
}
