//! The `Track` row — spec §3's authoritative record of a library item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Authoritative record of a library item (spec §3).
///
/// **Invariant:** `sha256` is globally unique — enforced by a unique index
/// (see [`super::migrations`]). Created exactly once by the ingestion
/// pipeline; updated only to flip indexing flags and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: Uuid,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    pub bitrate: Option<i64>,
    pub format: Option<String>,
    pub sha256: String,
    pub source_bytes: i64,
    pub stored_path: String,
    pub content_fingerprint: Option<Vec<u8>>,
    pub exact_indexed: bool,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
