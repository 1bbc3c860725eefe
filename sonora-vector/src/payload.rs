//! Payload and point shapes exchanged with the vector store (spec §4.3's
//! "Payload invariants").

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload carried on every embedding chunk point, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub track_id: Uuid,
    pub offset_sec: f64,
    pub chunk_index: i64,
    pub duration_sec: f64,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
}

/// One point to upsert: a 128-bit UUID id, a 512-dim vector, and its
/// payload (spec §4.3's `upsert` contract).
#[derive(Debug, Clone)]
pub struct EmbeddingPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A scored match returned from `query` (spec §4.3).
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Optional server-side filter applied to a query, per spec §4.7's
/// "exclude_track_id" exclusion and genre-scoped search.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub exclude_track_id: Option<Uuid>,
    pub genre: Option<String>,
}
