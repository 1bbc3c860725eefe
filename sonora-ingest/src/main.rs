//! `sonora-ingest` — thin admin CLI over the C7 ingestion pipeline.
//!
//! Only the library call semantics (`ingest`/`ingest_batch`) are specified;
//! this binary is a minimal `clap` wrapper, grounded on `wkmp-ap`'s
//! `clap::Parser` argument style. No progress UI is built (out of scope).

use anyhow::{Context, Result};
use clap::Parser;
use sonora_common::config::SearchConfig;
use sonora_embed::EmbeddingModel;
use sonora_fingerprint::FingerprintIndex;
use sonora_ingest::{ingest_batch, IngestContext, IngestStatus};
use sonora_vector::{CollectionSchema, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sonora-ingest")]
#[command(about = "Ingest one or more audio files into the sonora search index")]
#[command(version)]
struct Args {
    /// File(s) or directory to ingest.
    paths: Vec<PathBuf>,

    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    sonora_common::logging::init("sonora_ingest=info");

    let args = Args::parse();
    let config = SearchConfig::load(args.config.as_deref())?;

    let ctx = bootstrap(&config).await?;

    let files = collect_files(&args.paths)?;
    info!(count = files.len(), "starting ingestion");

    let mut bytes_per_file = Vec::with_capacity(files.len());
    for path in &files {
        bytes_per_file.push(std::fs::read(path).with_context(|| format!("reading {}", path.display()))?);
    }

    let results = ingest_batch(&ctx, bytes_per_file).await;

    let mut ingested = 0;
    let mut duplicates = 0;
    let mut skipped = 0;
    let mut errors = 0;

    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(r) => match r.status {
                IngestStatus::Ingested => {
                    ingested += 1;
                    info!(path = %path.display(), track_id = ?r.track_id, "ingested");
                }
                IngestStatus::Duplicate => {
                    duplicates += 1;
                    info!(path = %path.display(), track_id = ?r.track_id, "duplicate");
                }
                IngestStatus::Skipped => {
                    skipped += 1;
                    info!(path = %path.display(), reason = ?r.error, "skipped");
                }
                IngestStatus::Error => {
                    errors += 1;
                    error!(path = %path.display(), reason = ?r.error, "ingest error");
                }
            },
            Err(e) => {
                errors += 1;
                error!(path = %path.display(), error = %e, "ingest error");
            }
        }
    }

    info!(ingested, duplicates, skipped, errors, "ingestion complete");
    Ok(())
}

async fn bootstrap(config: &SearchConfig) -> Result<IngestContext> {
    let pool = sonora_common::db::connect(&config.database_url).await?;
    let fingerprint_index = Arc::new(FingerprintIndex::open(&config.fingerprint_index_dir)?);
    let embedding_model = Arc::new(EmbeddingModel::load(
        &config.embedding_model_path,
        config.embedding_model_id.clone(),
    )?);
    let vector_store = Arc::new(VectorStore::connect(&config.vector_store_url, &config.vector_collection).await?);
    vector_store
        .ensure_collection(&CollectionSchema::for_collection(&config.vector_collection))
        .await?;

    Ok(IngestContext::new(
        pool,
        config.raw_storage_dir.clone(),
        fingerprint_index,
        embedding_model,
        vector_store,
        config.clone(),
    ))
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}
