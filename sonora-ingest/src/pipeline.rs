//! C7 ingestion pipeline entry point (spec §4.5): one source-of-truth
//! `ingest()` implementing the six-step per-file protocol, plus a
//! sequential batch driver. Grounded on the teacher's phase-based
//! `workflow_orchestrator/mod.rs` state machine, collapsed from per-file
//! SSE progress events into a single async call.

use crate::chunk;
use crate::content_fingerprint;
use crate::dedup::{self, ContentCheck, HashCheck};
use crate::metadata;
use crate::storage;
use sonora_common::config::SearchConfig;
use sonora_common::db::{tracks, Track};
use sonora_common::{Error, Result};
use sonora_decode::{decode_dual, pcm_duration_seconds, sniff_format};
use sonora_embed::EmbeddingModel;
use sonora_fingerprint::FingerprintIndex;
use sonora_vector::{ChunkPayload, EmbeddingPoint, VectorStore};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

const MIN_INGEST_DURATION_S: f64 = 3.0;
const MAX_INGEST_DURATION_S: f64 = 1800.0;
const UPSERT_BATCH_SIZE: usize = 100;

/// Shared collaborators an ingestion call needs, assembled once at startup
/// (spec §4.9) and reused process-wide.
pub struct IngestContext {
    pub pool: SqlitePool,
    pub raw_dir: PathBuf,
    pub fingerprint_index: Arc<FingerprintIndex>,
    pub embedding_model: Arc<EmbeddingModel>,
    pub vector_store: Arc<VectorStore>,
    pub config: SearchConfig,
    /// Enforces "at most one concurrent ingestion" (spec §4.5/§6): a
    /// direct second caller gets `BUSY` rather than queueing silently.
    busy_gate: Mutex<()>,
}

impl IngestContext {
    pub fn new(
        pool: SqlitePool,
        raw_dir: PathBuf,
        fingerprint_index: Arc<FingerprintIndex>,
        embedding_model: Arc<EmbeddingModel>,
        vector_store: Arc<VectorStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            pool,
            raw_dir,
            fingerprint_index,
            embedding_model,
            vector_store,
            config,
            busy_gate: Mutex::new(()),
        }
    }
}

/// Outcome of one `ingest()` call (spec §4.5's `IngestResult`).
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub status: IngestStatus,
    pub track_id: Option<Uuid>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Ingested,
    Duplicate,
    Skipped,
    Error,
}

impl IngestResult {
    fn duplicate(track_id: Uuid) -> Self {
        Self {
            status: IngestStatus::Duplicate,
            track_id: Some(track_id),
            title: None,
            artist: None,
            error: None,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: IngestStatus::Skipped,
            track_id: None,
            title: None,
            artist: None,
            error: Some(reason.into()),
        }
    }

    fn ingested(track_id: Uuid, title: Option<String>, artist: Option<String>) -> Self {
        Self {
            status: IngestStatus::Ingested,
            track_id: Some(track_id),
            title,
            artist,
            error: None,
        }
    }
}

/// Ingests one file's raw bytes, per spec §4.5's six-step protocol.
pub async fn ingest(ctx: &IngestContext, bytes: Vec<u8>) -> Result<IngestResult> {
    let _busy = ctx.busy_gate.try_lock().map_err(|_| Error::Busy)?;

    if bytes.is_empty() {
        return Err(Error::EmptyInput);
    }

    // Step 1: exact-hash dedup short-circuits everything else.
    let sha256 = dedup::sha256_hex(bytes.clone()).await?;
    if let HashCheck::Duplicate { track_id } = dedup::check_exact_duplicate(&ctx.pool, &sha256).await? {
        info!(track_id = %track_id, "ingest: exact-hash duplicate");
        return Ok(IngestResult::duplicate(track_id));
    }

    let ext = sniff_format(&bytes).unwrap_or("bin");

    // Step 2: content-addressed persistence, idempotent.
    let stored_path = storage::persist(&ctx.raw_dir, &sha256, ext, &bytes).await?;

    // Step 3: tag extraction never fails the pipeline.
    let tags = metadata::extract(&bytes, ext);

    // Step 4: dual-rate decode plus ingest duration bounds.
    let (pcm_16k, pcm_48k) = decode_dual(&bytes).await?;
    let duration_s = pcm_duration_seconds(pcm_16k.len(), 16_000);

    if !(MIN_INGEST_DURATION_S..=MAX_INGEST_DURATION_S).contains(&duration_s) {
        warn!(duration_s, "ingest: duration outside [3s, 1800s], skipping");
        return Ok(IngestResult::skipped(format!(
            "duration {duration_s:.1}s outside [{MIN_INGEST_DURATION_S}, {MAX_INGEST_DURATION_S}]"
        )));
    }

    // Step 5a: content-similarity dedup. A hit here must skip C2/C4
    // writes entirely, so it runs to completion before either is started.
    let fingerprint = content_fingerprint::compute(&pcm_16k);
    if let ContentCheck::Duplicate { track_id, similarity } =
        dedup::check_content_duplicate(&ctx.pool, &fingerprint, duration_s).await?
    {
        info!(track_id = %track_id, similarity, "ingest: content duplicate");
        return Ok(IngestResult::duplicate(track_id));
    }

    let track_id = Uuid::new_v4();

    // Step 5b/5c: fingerprint indexing and chunked embedding run
    // concurrently — neither depends on the other's output.
    let index_fut = index_fingerprint(ctx, pcm_16k, track_id);
    let embed_fut = embed_and_upsert(ctx, pcm_48k, track_id, &tags);
    tokio::try_join!(index_fut, embed_fut)?;

    // Step 6: the track row lands last, after C2/C4 writes succeed.
    let now = sonora_common::time::now();
    let track = Track {
        id: track_id,
        title: tags.title.clone(),
        artist: tags.artist.clone(),
        album: tags.album,
        duration_seconds: duration_s,
        sample_rate: tags.sample_rate.map(i64::from),
        channels: tags.channels.map(i64::from),
        bitrate: tags.bitrate.map(i64::from),
        format: tags.format,
        sha256,
        source_bytes: bytes.len() as i64,
        stored_path: stored_path.to_string_lossy().to_string(),
        content_fingerprint: Some(content_fingerprint::to_bytes(&fingerprint)),
        exact_indexed: true,
        embedding_model: Some(ctx.config.embedding_model_id.clone()),
        embedding_dim: Some(ctx.config.embedding_dim as i64),
        created_at: now,
        updated_at: now,
    };
    tracks::insert(&ctx.pool, &track).await?;

    info!(track_id = %track_id, "ingest: complete");
    Ok(IngestResult::ingested(track_id, tags.title, tags.artist))
}

async fn index_fingerprint(ctx: &IngestContext, pcm_16k: Vec<f32>, track_id: Uuid) -> Result<()> {
    let index = Arc::clone(&ctx.fingerprint_index);
    tokio::task::spawn_blocking(move || index.index(&pcm_16k, track_id))
        .await
        .map_err(|e| Error::Internal(format!("fingerprint index task failed: {e}")))?
}

async fn embed_and_upsert(
    ctx: &IngestContext,
    pcm_48k: Vec<f32>,
    track_id: Uuid,
    tags: &metadata::TrackMetadata,
) -> Result<()> {
    let chunks = chunk::split(&pcm_48k, ctx.config.chunk_window_s, ctx.config.chunk_hop_s);

    let mut points = Vec::with_capacity(chunks.len());
    for c in chunks {
        let vector = ctx.embedding_model.embed(&c.samples).await?;
        points.push(EmbeddingPoint {
            id: Uuid::new_v4(),
            vector: vector.to_vec(),
            payload: ChunkPayload {
                track_id,
                offset_sec: c.offset_sec,
                chunk_index: c.index,
                duration_sec: c.duration_sec,
                artist: tags.artist.clone(),
                title: tags.title.clone(),
                genre: tags.genre.clone(),
            },
        });
    }

    for batch in points.chunks(UPSERT_BATCH_SIZE) {
        ctx.vector_store.upsert(batch.to_vec()).await?;
    }

    Ok(())
}

/// Sequential batch driver (spec §4.5's concurrency constraint: batch
/// ingestion processes files one at a time to bound memory and respect
/// the single fingerprint writer).
pub async fn ingest_batch(ctx: &IngestContext, files: Vec<Vec<u8>>) -> Vec<Result<IngestResult>> {
    let mut results = Vec::with_capacity(files.len());
    for bytes in files {
        results.push(ingest(ctx, bytes).await);
    }
    results
}
