//! C9 Vibe Lane (spec §4.7): single query embedding, nearest-chunk
//! retrieval, group-by-track scoring with a diversity bonus.

use sonora_common::config::SearchConfig;
use sonora_common::db::{tracks, Track};
use sonora_common::{Error, Result};
use sonora_embed::EmbeddingModel;
use sonora_vector::{QueryFilter, VectorStore};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct VibeMatch {
    pub track: Track,
    pub similarity: f32,
    pub embedding_model: String,
}

struct TrackAggregate {
    scores: Vec<f32>,
    distinct_chunk_indexes: HashSet<i64>,
}

/// Runs the vibe lane over 48 kHz mono PCM (spec §4.7).
pub async fn run_vibe(
    pool: &SqlitePool,
    embedding_model: &Arc<EmbeddingModel>,
    vector_store: &Arc<VectorStore>,
    config: &SearchConfig,
    pcm_48k: Vec<f32>,
    max_results: usize,
    exclude_track_id: Option<Uuid>,
) -> Result<Vec<VibeMatch>> {
    let query_vector = embedding_model.embed(&pcm_48k).await?;

    let filter = QueryFilter {
        exclude_track_id,
        genre: None,
    };

    let points = match vector_store
        .query(
            &query_vector,
            config.vibe_search_limit as u64,
            config.hnsw_ef,
            filter,
        )
        .await
    {
        Ok(points) => points,
        Err(Error::VectorStoreUnavailable(reason)) => {
            warn!(reason, "vibe lane: vector store unavailable, returning empty results");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut by_track: HashMap<Uuid, TrackAggregate> = HashMap::new();
    for point in points {
        let aggregate = by_track.entry(point.payload.track_id).or_insert_with(|| TrackAggregate {
            scores: Vec::new(),
            distinct_chunk_indexes: HashSet::new(),
        });
        aggregate.scores.push(point.score);
        aggregate.distinct_chunk_indexes.insert(point.payload.chunk_index);
    }

    let mut scored: Vec<(Uuid, f32)> = by_track
        .into_iter()
        .map(|(track_id, aggregate)| {
            let final_score = score_track(
                &aggregate.scores,
                aggregate.distinct_chunk_indexes.len(),
                config.vibe_top_k_per_track,
                config.vibe_diversity_weight,
            );
            (track_id, final_score)
        })
        .filter(|(_, final_score)| *final_score >= config.vibe_score_threshold)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let ids: Vec<Uuid> = scored.iter().map(|(id, _)| *id).collect();
    let found = tracks::select_by_ids(pool, &ids).await?;
    let by_id: HashMap<Uuid, Track> = found.into_iter().map(|t| (t.id, t)).collect();

    let matches = scored
        .into_iter()
        .filter_map(|(track_id, similarity)| {
            let track = by_id.get(&track_id)?.clone();
            Some(VibeMatch {
                track,
                similarity,
                embedding_model: embedding_model.model_id().to_string(),
            })
        })
        .take(max_results)
        .collect();

    Ok(matches)
}

/// Group-by-track score: mean of the top-`top_k` chunk similarities plus a
/// diversity bonus that rewards matches spread across distinct chunks
/// rather than one chunk repeated in the nearest-neighbor list (spec §4.7).
fn score_track(scores: &[f32], distinct_chunks: usize, top_k: usize, diversity_weight: f32) -> f32 {
    let mut top = scores.to_vec();
    top.sort_by(|a, b| b.partial_cmp(a).unwrap());
    top.truncate(top_k);

    let base_score = top.iter().sum::<f32>() / top.len() as f32;
    let diversity_bonus = (distinct_chunks as f32 / 5.0).min(1.0) * diversity_weight;

    base_score + diversity_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_track_averages_top_k_and_adds_diversity_bonus() {
        let score = score_track(&[0.9, 0.8, 0.7, 0.1], 3, 3, 0.1);
        let expected_base = (0.9 + 0.8 + 0.7) / 3.0;
        let expected_bonus = (3.0_f32 / 5.0).min(1.0) * 0.1;
        assert!((score - (expected_base + expected_bonus)).abs() < 1e-6);
    }

    #[test]
    fn score_track_caps_diversity_bonus_at_five_distinct_chunks() {
        let score_five = score_track(&[0.5], 5, 1, 0.2);
        let score_ten = score_track(&[0.5], 10, 1, 0.2);
        assert!((score_five - score_ten).abs() < 1e-6);
    }

    #[test]
    fn score_track_with_single_observation_equals_its_own_score() {
        let score = score_track(&[0.42], 1, 3, 0.0);
        assert!((score - 0.42).abs() < 1e-6);
    }
}
