//! # sonora-search
//!
//! C8-C11: the public search surface. Dual-lane matching (exact fingerprint
//! lookup, vibe embedding similarity), the `axum` orchestrator that fronts
//! them, and the startup/shutdown lifecycle that wires everything together.
//!
//! Grounded on `wkmp-ap`'s `AppContext`/`Router` layering and ordered
//! startup sequence, and `wkmp-dr`'s JSON search-response shape.

pub mod api;
pub mod exact;
pub mod startup;
pub mod vibe;

use sonora_common::config::SearchConfig;
use sonora_embed::EmbeddingModel;
use sonora_fingerprint::FingerprintIndex;
use sonora_ingest::IngestContext;
use sonora_vector::VectorStore;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state behind every route. Cheap to clone: the pool is an `Arc`
/// internally and everything else here is already wrapped in one.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub fingerprint_index: Arc<FingerprintIndex>,
    pub embedding_model: Arc<EmbeddingModel>,
    pub vector_store: Arc<VectorStore>,
    pub config: SearchConfig,
    pub ingest_ctx: Arc<IngestContext>,
}
