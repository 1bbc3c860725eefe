//! Exact (SHA-256) and content (C6) duplicate detection, grounded on the
//! teacher's `hash_deduplicator.rs`: hashing runs inside `spawn_blocking`,
//! and a hit short-circuits the rest of the pipeline.

use crate::content_fingerprint;
use sha2::{Digest, Sha256};
use sonora_common::db::tracks;
use sonora_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Content-duplicate similarity threshold (spec §4.4).
pub const CONTENT_DUPLICATE_THRESHOLD: f32 = 0.85;

/// Computes the SHA-256 digest of `bytes` off the async runtime — cheap
/// enough in practice to inline, but kept on `spawn_blocking` to match the
/// teacher's treatment of all hashing as CPU-bound (spec §5).
pub async fn sha256_hex(bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    })
    .await
    .map_err(|e| Error::Internal(format!("hash task failed: {e}")))
}

/// Result of the exact-hash check (ingest step 1, spec §4.5).
#[derive(Debug, Clone)]
pub enum HashCheck {
    Unique,
    Duplicate { track_id: Uuid },
}

pub async fn check_exact_duplicate(pool: &SqlitePool, sha256: &str) -> Result<HashCheck> {
    match tracks::select_by_hash(pool, sha256).await? {
        Some(existing) => Ok(HashCheck::Duplicate { track_id: existing.id }),
        None => Ok(HashCheck::Unique),
    }
}

/// Result of the content-similarity check (C6, spec §4.4/§4.5 step 5a).
#[derive(Debug, Clone)]
pub enum ContentCheck {
    Unique,
    Duplicate { track_id: Uuid, similarity: f32 },
}

/// Scans C5 for candidates within +-10% of `duration_s` and compares each
/// against `fingerprint` by normalized Hamming similarity.
pub async fn check_content_duplicate(
    pool: &SqlitePool,
    fingerprint: &[u32],
    duration_s: f64,
) -> Result<ContentCheck> {
    let candidates = tracks::scan_by_duration(pool, duration_s).await?;

    for candidate in candidates {
        let Some(bytes) = candidate.content_fingerprint else {
            continue;
        };
        let other = content_fingerprint::from_bytes(&bytes);
        let score = content_fingerprint::similarity(fingerprint, &other);
        if score >= CONTENT_DUPLICATE_THRESHOLD {
            return Ok(ContentCheck::Duplicate {
                track_id: candidate.id,
                similarity: score,
            });
        }
    }

    Ok(ContentCheck::Unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonora_common::db::Track;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sonora_common::db::migrations::run(&pool).await.unwrap();
        pool
    }

    fn sample_track(sha256: &str, duration_seconds: f64, fingerprint: Vec<u8>) -> Track {
        Track {
            id: Uuid::new_v4(),
            title: None,
            artist: None,
            album: None,
            duration_seconds,
            sample_rate: None,
            channels: None,
            bitrate: None,
            format: None,
            sha256: sha256.to_string(),
            source_bytes: 0,
            stored_path: String::new(),
            content_fingerprint: Some(fingerprint),
            exact_indexed: true,
            embedding_model: None,
            embedding_dim: None,
            created_at: sonora_common::time::now(),
            updated_at: sonora_common::time::now(),
        }
    }

    #[tokio::test]
    async fn sha256_hex_is_deterministic() {
        let a = sha256_hex(b"hello".to_vec()).await.unwrap();
        let b = sha256_hex(b"hello".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn exact_duplicate_is_detected_by_hash() {
        let pool = setup_test_db().await;
        let digest = "a".repeat(64);
        let track = sample_track(&digest, 120.0, vec![0, 0, 0, 0]);
        sonora_common::db::tracks::insert(&pool, &track).await.unwrap();

        match check_exact_duplicate(&pool, &digest).await.unwrap() {
            HashCheck::Duplicate { track_id } => assert_eq!(track_id, track.id),
            HashCheck::Unique => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn content_duplicate_found_within_duration_window() {
        let pool = setup_test_db().await;
        let words = vec![0xAAAA_AAAAu32; 10];
        let track = sample_track(&"b".repeat(64), 100.0, content_fingerprint::to_bytes(&words));
        sonora_common::db::tracks::insert(&pool, &track).await.unwrap();

        match check_content_duplicate(&pool, &words, 101.0).await.unwrap() {
            ContentCheck::Duplicate { track_id, similarity } => {
                assert_eq!(track_id, track.id);
                assert_eq!(similarity, 1.0);
            }
            ContentCheck::Unique => panic!("expected content duplicate"),
        }
    }

    #[tokio::test]
    async fn content_check_ignores_out_of_window_candidates() {
        let pool = setup_test_db().await;
        let words = vec![0xAAAA_AAAAu32; 10];
        let track = sample_track(&"c".repeat(64), 100.0, content_fingerprint::to_bytes(&words));
        sonora_common::db::tracks::insert(&pool, &track).await.unwrap();

        let result = check_content_duplicate(&pool, &words, 200.0).await.unwrap();
        assert!(matches!(result, ContentCheck::Unique));
    }
}
