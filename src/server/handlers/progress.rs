use axum::Json;
use axum::extract::State;

use crate::models::ProgressReport;
use crate::server::AppState;
use crate::server::protocol::ApiError;

pub async fn progress(State(state): State<AppState>) -> Result<Json<ProgressReport>, ApiError> {
    Ok(Json(state.with_store(|store| store.progress()).await?))
}
