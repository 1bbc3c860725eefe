//! C8 Exact Lane (spec §4.6): full-clip lookup for clips longer than 5 s,
//! sub-window consensus for shorter clips.

use sonora_common::config::SearchConfig;
use sonora_common::db::Track;
use sonora_common::{db::tracks, Error, Result};
use sonora_decode::pcm_duration_seconds;
use sonora_fingerprint::{hop_tolerance_sec, Candidate, FingerprintIndex};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const FULL_CLIP_THRESHOLD_S: f64 = 5.0;
const FINGERPRINT_SAMPLE_RATE: usize = 16_000;

#[derive(Debug, Clone)]
pub struct ExactMatch {
    pub track: Track,
    pub confidence: f32,
    pub offset_seconds: Option<f64>,
    pub aligned_hashes: u32,
}

struct ScoredCandidate {
    track_id: Uuid,
    offset_seconds: Option<f64>,
    aligned_hashes: u32,
}

/// Runs the exact lane over 16 kHz mono PCM (spec §4.6).
pub async fn run_exact(
    pool: &SqlitePool,
    index: &Arc<FingerprintIndex>,
    config: &SearchConfig,
    pcm_16k: Vec<f32>,
    max_results: usize,
) -> Result<Vec<ExactMatch>> {
    let duration_s = pcm_duration_seconds(pcm_16k.len(), FINGERPRINT_SAMPLE_RATE);

    let scored = if duration_s > FULL_CLIP_THRESHOLD_S {
        query_full_clip(index, pcm_16k).await?
    } else {
        query_subwindow_consensus(index, config, pcm_16k).await?
    };

    let mut filtered: Vec<ScoredCandidate> = scored
        .into_iter()
        .filter(|c| c.aligned_hashes >= config.exact_min_aligned_hashes)
        .collect();
    filtered.sort_by(|a, b| b.aligned_hashes.cmp(&a.aligned_hashes));

    let ids: Vec<Uuid> = filtered.iter().map(|c| c.track_id).collect();
    let found = tracks::select_by_ids(pool, &ids).await?;
    let by_id: HashMap<Uuid, Track> = found.into_iter().map(|t| (t.id, t)).collect();

    let matches = filtered
        .into_iter()
        .filter_map(|c| {
            let track = by_id.get(&c.track_id)?.clone();
            let confidence = (c.aligned_hashes as f32 / config.exact_strong_match_hashes as f32).min(1.0);
            Some(ExactMatch {
                track,
                confidence,
                offset_seconds: c.offset_seconds,
                aligned_hashes: c.aligned_hashes,
            })
        })
        .take(max_results)
        .collect();

    Ok(matches)
}

async fn query_full_clip(index: &Arc<FingerprintIndex>, pcm_16k: Vec<f32>) -> Result<Vec<ScoredCandidate>> {
    let index = Arc::clone(index);
    let candidates = blocking_query(index, pcm_16k).await?;
    Ok(candidates
        .into_iter()
        .map(|c| ScoredCandidate {
            track_id: c.track_id,
            offset_seconds: Some(c.offset_sec as f64),
            aligned_hashes: c.aligned_hashes,
        })
        .collect())
}

async fn query_subwindow_consensus(
    index: &Arc<FingerprintIndex>,
    config: &SearchConfig,
    pcm_16k: Vec<f32>,
) -> Result<Vec<ScoredCandidate>> {
    let window_samples = (config.exact_subwindow_duration_s * FINGERPRINT_SAMPLE_RATE as f64) as usize;

    let mut per_window: Vec<(f64, Vec<Candidate>)> = Vec::with_capacity(config.exact_subwindow_starts_s.len());
    for &start_s in &config.exact_subwindow_starts_s {
        let start = (start_s * FINGERPRINT_SAMPLE_RATE as f64) as usize;
        if start >= pcm_16k.len() {
            continue;
        }
        let end = (start + window_samples).min(pcm_16k.len());
        let window = pcm_16k[start..end].to_vec();

        let candidates = blocking_query(Arc::clone(index), window).await?;
        per_window.push((start_s, candidates));
    }

    let tolerance = hop_tolerance_sec() as f64;

    // track_id -> per-window (corrected_offset, aligned_hashes)
    let mut by_track: HashMap<Uuid, Vec<(f64, u32)>> = HashMap::new();
    for (start_s, candidates) in &per_window {
        for candidate in candidates {
            let corrected = candidate.offset_sec as f64 - start_s;
            by_track
                .entry(candidate.track_id)
                .or_default()
                .push((corrected, candidate.aligned_hashes));
        }
    }

    let mut scored = Vec::new();
    for (track_id, observations) in by_track {
        let offsets: Vec<f64> = observations.iter().map(|(o, _)| *o).collect();
        let min = offsets.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = offsets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        // Different windows disagreeing beyond one hash-hop of tolerance:
        // reject this track's candidacy entirely (spec §4.6 consensus rules).
        if max - min > tolerance {
            continue;
        }

        let aligned_hashes: u32 = observations.iter().map(|(_, h)| *h).sum();
        let median_offset = median(&offsets);

        scored.push(ScoredCandidate {
            track_id,
            offset_seconds: Some(median_offset),
            aligned_hashes,
        });
    }

    Ok(scored)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Index lookup is CPU-bound and synchronous; dispatched to the blocking
/// pool so the cooperative scheduler stays responsive (spec §4.6, §5).
async fn blocking_query(index: Arc<FingerprintIndex>, pcm: Vec<f32>) -> Result<Vec<Candidate>> {
    tokio::task::spawn_blocking(move || index.query(&pcm))
        .await
        .map_err(|e| Error::Internal(format!("fingerprint query task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_length_is_middle_element() {
        assert_eq!(median(&[1.0, 3.0, 2.0]), 2.0);
    }

    #[test]
    fn median_of_even_length_averages_middle_pair() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }
}
