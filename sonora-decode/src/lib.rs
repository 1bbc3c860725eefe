//! # sonora-decode
//!
//! C1 Audio Decoder: converts arbitrary container/codec bytes to mono PCM at
//! a requested sample rate, plus the dual-rate convenience path the rest of
//! the pipeline needs (16 kHz for fingerprinting, 48 kHz for embedding).
//!
//! Grounded on `wkmp-ai`'s symphonia decode loop (mono downmix by channel
//! averaging) and `wkmp-ap`'s rubato resampler wrapper, generalized from a
//! streaming/chunked decoder to a whole-buffer one-shot decode (queries and
//! ingestion both hand this crate a complete in-memory clip).

pub mod decoder;
pub mod resample;

pub use decoder::{decode, decode_dual, pcm_duration_seconds, sniff_format, SampleFormat};
