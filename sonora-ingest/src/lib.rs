//! # sonora-ingest
//!
//! C5 track rows (re-exported from `sonora_common::db`), C6 content
//! deduplication, and the C7 ingestion pipeline (spec §4.4, §4.5).
//!
//! Grounded on `wkmp-ai`'s import pipeline: `hash_deduplicator.rs` for
//! exact-hash dedup, `passage_segmenter.rs` for windowing style, and
//! `workflow_orchestrator/mod.rs` for the phase-ordered per-file protocol.

pub mod chunk;
pub mod content_fingerprint;
pub mod dedup;
pub mod metadata;
pub mod pipeline;
pub mod storage;

pub use pipeline::{ingest, ingest_batch, IngestContext, IngestResult, IngestStatus};
