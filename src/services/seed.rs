//! Built-in seed corpus.

use serde::Deserialize;

use crate::error::IngestError;
use crate::models::Document;

const SEED_CORPUS: &str = include_str!("../../data/seed_corpus.toml");

#[derive(Debug, Deserialize)]
struct SeedCorpus {
    documents: Vec<SeedEntry>,
}

#[derive(Debug, Deserialize)]
struct SeedEntry {
    name: String,
    subject: String,
    topic: String,
    content: String,
}

/// Parse the bundled corpus into seed documents.
pub fn seed_documents() -> Result<Vec<Document>, IngestError> {
    parse_seed_corpus(SEED_CORPUS)
}

fn parse_seed_corpus(source: &str) -> Result<Vec<Document>, IngestError> {
    let corpus: SeedCorpus = toml::from_str(source)
        .map_err(|e| IngestError::ExtractionFailed(format!("seed corpus: {}", e)))?;

    Ok(corpus
        .documents
        .iter()
        .map(|entry| Document::seed(&entry.name, &entry.subject, &entry.topic, &entry.content))
        .collect())
}
