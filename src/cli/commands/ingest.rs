//! Bulk ingestion from the local filesystem.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use walkdir::WalkDir;

use super::open_index;
use crate::cli::output::{IngestStats, get_formatter};
use crate::models::{Config, DocumentKind, OutputFormat, UploadedDocument};
use crate::services::{IngestionPipeline, TextChunker, TutorStore, timestamp_now};
use crate::utils::{is_supported_document, preview, read_file_limited, sanitize_filename};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// List the files that would be ingested without touching the index
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let mut files = Vec::new();
    for path in &args.paths {
        let path = path
            .canonicalize()
            .with_context(|| format!("invalid path: {}", path.display()))?;
        files.extend(collect_files(
            &path,
            &args.exclude,
            &config.indexing.exclude_patterns,
        )?);
    }

    if files.is_empty() {
        println!("{}", formatter.format_message("No files found to ingest."));
        return Ok(());
    }

    if args.dry_run {
        let supported: Vec<&PathBuf> = files.iter().filter(|f| is_supported_document(f)).collect();
        println!(
            "{}",
            formatter.format_message(&format!(
                "Dry run: would ingest {} of {} files",
                supported.len(),
                files.len()
            ))
        );
        for file in supported {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let (embedder, index) = open_index(&config).await?;
    let pipeline = IngestionPipeline::new(
        embedder,
        index,
        TextChunker::new(&config.indexing),
        config.embedding.batch_size as usize,
    );
    let store = TutorStore::open(&config.database_path())?;
    let uploads_dir = config.uploads_dir();
    std::fs::create_dir_all(&uploads_dir)
        .with_context(|| format!("failed to create {}", uploads_dir.display()))?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut stats = IngestStats {
        files_scanned: files.len() as u64,
        ..Default::default()
    };

    for file_path in &files {
        pb.inc(1);

        if !is_supported_document(file_path) {
            stats.files_skipped += 1;
            continue;
        }

        match ingest_file(&pipeline, &store, &uploads_dir, file_path, &config).await {
            Ok(chunks) => {
                stats.files_indexed += 1;
                stats.chunks_created += chunks as u64;
                if verbose {
                    pb.println(format!("Ingested {} ({} chunks)", file_path.display(), chunks));
                }
            }
            Err(e) => {
                stats.files_failed += 1;
                warn!(path = %file_path.display(), error = %e, "failed to ingest file");
                if verbose {
                    pb.println(format!("Failed {}: {:#}", file_path.display(), e));
                }
            }
        }
    }

    pb.finish_and_clear();
    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_ingest_stats(&stats));

    Ok(())
}

/// Ingest one file and record it alongside HTTP uploads.
async fn ingest_file(
    pipeline: &IngestionPipeline,
    store: &TutorStore,
    uploads_dir: &Path,
    path: &Path,
    config: &Config,
) -> Result<usize> {
    let original_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let filename = sanitize_filename(&original_name);

    let bytes = read_file_limited(path, config.indexing.max_file_size)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_size = bytes.len() as u64;

    let stored_path = uploads_dir.join(&filename);
    tokio::fs::write(&stored_path, &bytes)
        .await
        .with_context(|| format!("failed to store {}", stored_path.display()))?;

    let report = match pipeline
        .ingest_file(&filename, bytes, DocumentKind::Upload)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(e.into());
        }
    };

    let recorded = store.insert_document(&UploadedDocument {
        id: report.document_id.clone(),
        filename,
        original_name,
        upload_date: timestamp_now(),
        file_size,
        chunk_count: report.chunks_added as u32,
        content_preview: preview(&report.content, 200),
    });
    if let Err(e) = recorded {
        pipeline.delete_document(&report.document_id).await?;
        let _ = tokio::fs::remove_file(&stored_path).await;
        return Err(e.into());
    }

    Ok(report.chunks_added)
}

fn collect_files(path: &Path, exclude: &[String], default_exclude: &[String]) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let patterns: Vec<glob::Pattern> = exclude
        .iter()
        .chain(default_exclude.iter())
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.context("failed to read directory entry")?;
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }

        let path_str = entry_path.to_string_lossy();
        if !patterns.iter().any(|p| p.matches(&path_str)) {
            files.push(entry_path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_applies_excludes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.pdf"), "beta").unwrap();
        std::fs::create_dir(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("drafts/c.txt"), "gamma").unwrap();

        let files = collect_files(dir.path(), &["**/drafts/**".to_string()], &[]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_ingest_file_unwritable_uploads_leaves_index_empty() {
        use std::sync::Arc;

        use crate::services::SqliteBackend;
        use crate::services::testing::HashEmbedder;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "Cells divide by mitosis.").unwrap();

        let pipeline = IngestionPipeline::new(
            Arc::new(HashEmbedder::new(32)),
            Arc::new(SqliteBackend::in_memory("test", 32).unwrap()),
            TextChunker::with_size(200, 20),
            8,
        );
        let store = TutorStore::in_memory().unwrap();
        let missing = dir.path().join("missing").join("uploads");

        let result = ingest_file(&pipeline, &store, &missing, &file, &Config::default()).await;
        assert!(result.is_err());
        assert_eq!(pipeline.indexed_chunks().await.unwrap(), 0);
        assert!(store.list_documents().unwrap().is_empty());
    }

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "notes").unwrap();

        let files = collect_files(&file, &[], &[]).unwrap();
        assert_eq!(files, vec![file]);
    }
}
