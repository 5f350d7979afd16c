mod ask;
mod config;
mod ingest;
mod serve;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::Config;
use crate::services::{Embedder, OnnxEmbedder, VectorStore, create_backend};

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use serve::ServeArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use ingest::handle_ingest;
pub use serve::handle_serve;
pub use status::handle_status;

/// Load the embedding model and open the vector index it feeds.
async fn open_index(config: &Config) -> Result<(Arc<dyn Embedder>, Arc<dyn VectorStore>)> {
    let model_dir = config.model_dir();
    debug!(dir = %model_dir.display(), "loading embedding model");
    let embedder = OnnxEmbedder::load(&config.embedding, &model_dir).with_context(|| {
        format!(
            "failed to load embedding model from {}",
            model_dir.display()
        )
    })?;

    let index = create_backend(
        &config.vector_store,
        &config.index_dir(),
        embedder.dimension() as u64,
    )
    .await
    .context("failed to open vector index")?;

    Ok((Arc::new(embedder), index))
}
