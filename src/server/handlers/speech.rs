use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::error::GenerationError;
use crate::server::AppState;
use crate::server::protocol::{
    ApiError, SynthesisRequest, SynthesisResponse, TranscriptionResponse,
};

const DEFAULT_AUDIO_MIME: &str = "audio/wav";

/// Transcribe the multipart `audio` part.
pub async fn recognize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut audio = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("audio") {
            let mime_type = field
                .content_type()
                .filter(|ct| ct.starts_with("audio/"))
                .unwrap_or(DEFAULT_AUDIO_MIME)
                .to_string();
            audio = Some((field.bytes().await?, mime_type));
            break;
        }
    }

    let Some((bytes, mime_type)) = audio.filter(|(bytes, _)| !bytes.is_empty()) else {
        return Err(ApiError::BadRequest("no audio data provided".to_string()));
    };

    let Some(speech) = state.speech.as_ref() else {
        return Err(ApiError::Unavailable(
            "speech recognition not available".to_string(),
        ));
    };

    debug!(bytes = bytes.len(), mime_type = %mime_type, "transcribing audio");
    let text = speech.transcribe(&bytes, &mime_type).await?;
    Ok(Json(TranscriptionResponse { text }))
}

/// Read `text` aloud and return the audio as base64.
pub async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<Json<SynthesisResponse>, ApiError> {
    let Json(request) = payload?;
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("no text provided".to_string()));
    }

    let Some(tts) = state.tts.as_ref() else {
        return Err(ApiError::Unavailable(
            "text-to-speech not available".to_string(),
        ));
    };

    let speech = tts.synthesize(text).await.map_err(|e| match e {
        GenerationError::MissingApiKey => {
            ApiError::Unavailable("text-to-speech not available".to_string())
        }
        other => ApiError::Internal(format!("text-to-speech failed: {}", other)),
    })?;
    debug!(chars = text.len(), bytes = speech.audio.len(), "synthesized speech");

    Ok(Json(SynthesisResponse {
        success: true,
        audio: BASE64.encode(&speech.audio),
        mime_type: speech.mime_type,
    }))
}
