mod handlers;
pub mod protocol;
mod state;

pub use state::AppState;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::Config;
use crate::services::seed_documents;

use handlers::{chat, documents, progress, quiz, speech, study};

/// Build the API router. Bodies larger than `max_upload_bytes` are rejected with 413.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(chat::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/conversations", get(chat::conversations))
        .route("/api/documents", get(documents::list))
        .route("/api/documents/upload", post(documents::upload))
        .route("/api/documents/{id}", delete(documents::delete))
        .route("/api/quiz/generate", post(quiz::generate))
        .route("/api/quiz/submit", post(quiz::submit))
        .route("/api/quiz/history", get(quiz::history))
        .route("/api/study/start", post(study::start))
        .route("/api/study/stop/{id}", post(study::stop))
        .route("/api/study/sessions", get(study::sessions))
        .route("/api/progress", get(progress::progress))
        .route("/api/speech/recognize", post(speech::recognize))
        .route("/api/speech/synthesize", post(speech::synthesize))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load every service, index the seed corpus if asked to, and serve until
/// Ctrl+C or SIGTERM.
pub async fn run_server(config: Config, seed_corpus: bool) -> Result<(), AppError> {
    let state = AppState::from_config(&config).await?;

    if seed_corpus {
        match seed_documents() {
            Ok(documents) => {
                if let Err(e) = state.pipeline.ensure_seed_corpus(&documents).await {
                    warn!(error = %e, "failed to index seed corpus");
                }
            }
            Err(e) => warn!(error = %e, "failed to load seed corpus"),
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "study tutor listening");

    axum::serve(listener, router(state, config.server.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
