use axum::Json;
use axum::extract::{Multipart, Path, State};
use tracing::{info, warn};

use crate::models::{DocumentKind, UploadedDocument};
use crate::server::AppState;
use crate::server::protocol::{
    ApiError, DocumentsResponse, SuccessResponse, UploadResponse, UploadResult,
};
use crate::services::timestamp_now;
use crate::utils::{preview, sanitize_filename};

const PREVIEW_CHARS: usize = 200;

/// Ingest every `files` part. Each file gets its own result; one failure does
/// not affect the others.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut results = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let original_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let bytes = field.bytes().await?;

        let filename = sanitize_filename(&original_name);
        let file_size = bytes.len() as u64;
        let result = match store_upload(&state, &filename, &original_name, &bytes).await {
            Ok(chunks_added) => UploadResult::Ingested {
                filename,
                chunks_added,
                file_size,
            },
            Err(e) => {
                warn!(filename = %filename, error = %e.message(), "upload rejected");
                UploadResult::Failed {
                    filename,
                    error: e.message().to_string(),
                }
            }
        };
        results.push(result);
    }

    if results.is_empty() {
        return Err(ApiError::BadRequest("no files provided".to_string()));
    }
    Ok(Json(UploadResponse { results }))
}

/// Save the file, index it, then record it. A failure at any step undoes the
/// earlier ones so the index never holds chunks without a record.
async fn store_upload(
    state: &AppState,
    filename: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<usize, ApiError> {
    let path = state.uploads_dir.join(filename);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store {}: {}", filename, e)))?;

    let report = match state
        .pipeline
        .ingest_file(filename, bytes.to_vec(), DocumentKind::Upload)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            remove_upload(&path).await;
            return Err(e.into());
        }
    };

    let record = UploadedDocument {
        id: report.document_id.clone(),
        filename: filename.to_string(),
        original_name: original_name.to_string(),
        upload_date: timestamp_now(),
        file_size: bytes.len() as u64,
        chunk_count: report.chunks_added as u32,
        content_preview: preview(&report.content, PREVIEW_CHARS),
    };
    if let Err(e) = state
        .with_store(move |store| store.insert_document(&record))
        .await
    {
        if let Err(cleanup) = state.pipeline.delete_document(&report.document_id).await {
            warn!(document.id = %report.document_id, error = %cleanup, "failed to drop chunks of unrecorded upload");
        }
        remove_upload(&path).await;
        return Err(e);
    }

    Ok(report.chunks_added)
}

async fn remove_upload(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove uploaded file"),
    }
}

pub async fn list(State(state): State<AppState>) -> Result<Json<DocumentsResponse>, ApiError> {
    Ok(Json(DocumentsResponse {
        documents: state.with_store(|store| store.list_documents()).await?,
    }))
}

/// Remove the stored file, the record and every indexed chunk.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let lookup_id = id.clone();
    let Some(record) = state
        .with_store(move |store| store.get_document(&lookup_id))
        .await?
    else {
        return Err(ApiError::NotFound("document not found".to_string()));
    };

    state.pipeline.delete_document(&id).await?;

    remove_upload(&state.uploads_dir.join(&record.filename)).await;

    let delete_id = id.clone();
    state
        .with_store(move |store| store.delete_document(&delete_id))
        .await?;
    info!(document.id = %id, filename = %record.filename, "deleted document");

    Ok(Json(SuccessResponse { success: true }))
}
