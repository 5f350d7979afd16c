use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::{TutorStore, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let model_dir = config.model_dir();
    let embedding_loaded =
        model_dir.join("model.onnx").exists() && model_dir.join("tokenizer.json").exists();

    let (vector_store_connected, indexed_chunks) = match create_backend(
        &config.vector_store,
        &config.index_dir(),
        u64::from(config.embedding.dimension),
    )
    .await
    {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            let chunks = if connected {
                store
                    .get_collection_info()
                    .await
                    .ok()
                    .flatten()
                    .map_or(0, |info| info.points_count)
            } else {
                0
            };
            (connected, chunks)
        }
        Err(_) => (false, 0),
    };

    let progress = if config.database_path().exists() {
        TutorStore::open(&config.database_path())
            .and_then(|store| store.progress())
            .ok()
    } else {
        None
    };

    let status = StatusInfo {
        embedding_model: config.embedding.model_id.clone(),
        embedding_loaded,
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_connected,
        collection: config.vector_store.collection.clone(),
        indexed_chunks,
        data_dir: config.data_dir().display().to_string(),
        generation_model: config.generation.model.clone(),
        generation_key_set: config.generation.api_key.is_some(),
        documents_uploaded: progress.as_ref().map_or(0, |p| p.documents_uploaded),
        quizzes_generated: progress.as_ref().map_or(0, |p| p.quizzes_generated),
        study_sessions: progress.as_ref().map_or(0, |p| p.study_sessions),
        conversations: progress.as_ref().map_or(0, |p| p.conversations),
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_loaded {
        eprintln!();
        eprintln!(
            "Hint: embedding model not found in {}",
            model_dir.display()
        );
        eprintln!("      Place model.onnx and tokenizer.json there or set embedding.model_path.");
    }
    if !vector_store_connected && config.vector_store.driver == VectorDriver::Qdrant {
        eprintln!("Warning: Qdrant not reachable at {}", config.vector_store.url);
    }
    if !status.generation_key_set {
        eprintln!("Hint: set GEMINI_API_KEY to enable answers, quizzes and speech input.");
    }

    Ok(())
}
