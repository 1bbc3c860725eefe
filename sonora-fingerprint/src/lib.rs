//! # sonora-fingerprint
//!
//! C2 Fingerprint Index: a spectral-landmark fingerprinter backed by an
//! embedded LMDB (`heed`) inverted index mapping landmark hash → candidate
//! `(track_id, offset)` pairs, with single-writer/multi-reader semantics
//! (spec §4.2).
//!
//! Grounded on the teacher's general approach to native/CPU-bound audio
//! work (`wkmp-ai`'s chromaprint fingerprinter and hash deduplicator both
//! run their C library / hashing work off the async runtime); `rustfft` is
//! the same crate `KEYHAN-A-audiosync`'s core engine uses for spectral
//! analysis, here repurposed from cross-correlation to landmark peak-picking.

pub mod index;
pub mod landmarks;

pub use index::{Candidate, FingerprintIndex};
pub use landmarks::{extract_landmarks, hop_tolerance_sec, Landmark};
