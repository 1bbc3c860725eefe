//! ONNX Runtime session wrapper for the 512-dim audio embedding model.

use ort::session::Session;
use ort::value::Tensor;
use sonora_common::{Error, Result};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Output dimension, surfaced as a constant per spec §4.3.
pub const EMBEDDING_DIM: usize = 512;

/// 48 kHz sample rate the model expects.
const MODEL_SAMPLE_RATE: u32 = 48_000;

/// Inputs shorter than 10s are padded with silence (spec §4.3).
const MIN_INPUT_SECONDS: f64 = 10.0;

/// Loaded embedding model, shared process-wide (spec §4.9, §5): a single
/// `ort::Session` guarded by a `Mutex` for interior access plus a
/// size-1 `Semaphore` serializing inference calls, since CPU inference is
/// single-threaded and concurrent calls would only double latency.
pub struct EmbeddingModel {
    session: Mutex<Session>,
    inference_gate: Semaphore,
    model_id: String,
}

impl EmbeddingModel {
    /// Loads the ONNX model from `model_path`. Does not run a warm-up
    /// inference — call [`Self::warm_up`] once after construction, per
    /// spec §4.9's startup sequence.
    pub fn load(model_path: &Path, model_id: impl Into<String>) -> Result<Self> {
        info!(path = %model_path.display(), "loading embedding model");

        let session = Session::builder()
            .map_err(|e| Error::Internal(format!("failed to create ONNX session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                Error::Internal(format!(
                    "failed to load embedding model from {}: {e}",
                    model_path.display()
                ))
            })?;

        Ok(Self {
            session: Mutex::new(session),
            inference_gate: Semaphore::new(1),
            model_id: model_id.into(),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Runs one warm-up inference on 5 s of silence (spec §4.9), logging
    /// cold-start time.
    pub async fn warm_up(&self) -> Result<()> {
        let started = std::time::Instant::now();
        let silence = vec![0.0f32; (MODEL_SAMPLE_RATE as usize) * 5];
        self.embed(&silence).await?;
        info!(elapsed_ms = started.elapsed().as_millis(), "embedding model warm-up complete");
        Ok(())
    }

    /// Computes a 512-dim embedding from 48 kHz mono f32 PCM (spec §4.3).
    /// Acquires the size-1 inference semaphore and runs on the blocking
    /// thread pool, per spec §5's scheduling model.
    pub async fn embed(&self, pcm_48k: &[f32]) -> Result<[f32; EMBEDDING_DIM]> {
        let _permit = self
            .inference_gate
            .acquire()
            .await
            .map_err(|_| Error::Internal("embedding inference semaphore closed".to_string()))?;

        let padded = pad_to_min_duration(pcm_48k);

        // Session is !Send in some ort builds; route the blocking call
        // through a closure captured by reference and execute it inline
        // under the semaphore rather than spawn_blocking across threads
        // the Mutex guard can't cross. CPU work still happens off the
        // cooperative scheduler from the caller's perspective because the
        // caller itself runs this lane inside spawn_blocking (see
        // sonora-search's exact/vibe lanes).
        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Internal("embedding model session lock poisoned".to_string()))?;

        run_inference(&mut session, &padded)
    }
}

fn pad_to_min_duration(pcm: &[f32]) -> Vec<f32> {
    let min_samples = (MIN_INPUT_SECONDS * MODEL_SAMPLE_RATE as f64) as usize;
    if pcm.len() >= min_samples {
        return pcm.to_vec();
    }

    let mut padded = pcm.to_vec();
    padded.resize(min_samples, 0.0);
    padded
}

fn run_inference(session: &mut Session, samples: &[f32]) -> Result<[f32; EMBEDDING_DIM]> {
    let input = Tensor::from_array(([1usize, samples.len()], samples.to_vec().into_boxed_slice()))
        .map_err(|e| Error::Internal(format!("failed to build embedding input tensor: {e}")))?;

    let outputs = session
        .run(ort::inputs![input].map_err(|e| Error::Internal(format!("failed to bind input: {e}")))?)
        .map_err(|e| Error::Internal(format!("embedding inference failed: {e}")))?;

    let (_, raw) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| Error::Internal(format!("failed to read embedding output: {e}")))?;

    if raw.len() != EMBEDDING_DIM {
        return Err(Error::Internal(format!(
            "embedding model produced {} dims, expected {EMBEDDING_DIM}",
            raw.len()
        )));
    }

    let mut embedding = [0.0f32; EMBEDDING_DIM];
    embedding.copy_from_slice(raw);
    Ok(l2_normalize(embedding))
}

/// The vector store ranks by cosine distance (spec §4.3, §6); normalizing
/// here keeps inner-product and cosine equivalent downstream.
fn l2_normalize(mut vec: [f32; EMBEDDING_DIM]) -> [f32; EMBEDDING_DIM] {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_extends_short_clips_to_ten_seconds() {
        let short = vec![0.1f32; MODEL_SAMPLE_RATE as usize * 3];
        let padded = pad_to_min_duration(&short);
        assert_eq!(padded.len(), MODEL_SAMPLE_RATE as usize * 10);
    }

    #[test]
    fn padding_leaves_long_clips_unchanged() {
        let long = vec![0.1f32; MODEL_SAMPLE_RATE as usize * 15];
        let padded = pad_to_min_duration(&long);
        assert_eq!(padded.len(), long.len());
    }

    #[test]
    fn l2_normalize_produces_unit_vector() {
        let mut v = [0.0f32; EMBEDDING_DIM];
        v[0] = 3.0;
        v[1] = 4.0;
        let normalized = l2_normalize(v);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector_unchanged() {
        let v = [0.0f32; EMBEDDING_DIM];
        let normalized = l2_normalize(v);
        assert_eq!(normalized, v);
    }
}

// Debug helper mirrors silero.rs's env-gated introspection, useful when a
// model export has an unexpected I/O shape.
#[allow(dead_code)]
fn log_session_io(session: &Session) {
    for input in &session.inputs {
        debug!(name = %input.name, "embedding model input");
    }
    for output in &session.outputs {
        debug!(name = %output.name, "embedding model output");
    }
}
