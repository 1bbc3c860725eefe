//! # sonora-vector
//!
//! C4 Vector Store: a thin wrapper around `qdrant-client` implementing the
//! `ensure_collection` / `upsert` / `query` contract spec §4.3 describes in
//! Qdrant's own vocabulary (HNSW m/ef_construct, scalar int8 quantization,
//! keyword payload indexes).
//!
//! No example repo in the retrieval pack runs a vector database, so this
//! crate is grounded directly on the spec's Qdrant-shaped API surface rather
//! than on teacher code — see `DESIGN.md`.

pub mod payload;
pub mod store;

pub use payload::{ChunkPayload, EmbeddingPoint, QueryFilter, ScoredPoint};
pub use store::{CollectionSchema, VectorStore};
