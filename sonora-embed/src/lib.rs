//! # sonora-embed
//!
//! C3 Embedding Model: a process-wide, `ort`-backed ONNX Runtime session
//! producing a 512-dim audio embedding from 48 kHz mono PCM, plus the
//! inference concurrency gate C9/C11 need (spec §4.3, §4.9, §5).
//!
//! Grounded on `itsmontoya-scribble`'s `ort::session::Session` /
//! `ort::value::Tensor` usage for its Silero ONNX backend — the same
//! "load once, run many" session lifecycle, here applied to a
//! `laion/larger_clap_music_and_speech`-shaped audio embedding model
//! instead of a speech model.

pub mod model;

pub use model::{EmbeddingModel, EMBEDDING_DIM};
