//! C5 track-row operations shared by the ingestion pipeline and the search
//! lanes: insert, select-by-id, select-by-hash, bulk-select-by-ids, and the
//! duration-bounded scan used by content dedup (spec §4.4/§4.5).

use super::models::Track;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Row shape for [`scan_by_duration`] — just enough to run content-dedup
/// comparison without pulling the whole `Track` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FingerprintCandidate {
    pub id: Uuid,
    pub content_fingerprint: Option<Vec<u8>>,
}

/// Inserts a new track row. Callers mint `track.id` themselves so C2/C4
/// writes (keyed by the same id) can happen before this insert commits
/// (spec §4.5 step 6 — the row lands last).
pub async fn insert(pool: &SqlitePool, track: &Track) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, title, artist, album, duration_seconds, sample_rate, channels,
            bitrate, format, sha256, source_bytes, stored_path,
            content_fingerprint, exact_indexed, embedding_model, embedding_dim,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.id)
    .bind(&track.title)
    .bind(&track.artist)
    .bind(&track.album)
    .bind(track.duration_seconds)
    .bind(track.sample_rate)
    .bind(track.channels)
    .bind(track.bitrate)
    .bind(&track.format)
    .bind(&track.sha256)
    .bind(track.source_bytes)
    .bind(&track.stored_path)
    .bind(&track.content_fingerprint)
    .bind(track.exact_indexed)
    .bind(&track.embedding_model)
    .bind(track.embedding_dim)
    .bind(track.created_at)
    .bind(track.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn select_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Track>> {
    let track = sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(track)
}

/// Used by ingestion step 1 — a digest hit returns `DUPLICATE` immediately.
pub async fn select_by_hash(pool: &SqlitePool, sha256: &str) -> Result<Option<Track>> {
    let track = sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE sha256 = ?")
        .bind(sha256)
        .fetch_optional(pool)
        .await?;
    Ok(track)
}

/// Bulk fetch for joining lane candidates back against C5 (spec §4.6 step
/// "Track lookup", §4.7 step 6). Ids with no matching row are silently
/// absent from the result — callers treat that as an orphan to discard.
pub async fn select_by_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<Vec<Track>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM tracks WHERE id IN ({placeholders})");

    let mut query = sqlx::query_as::<_, Track>(&sql);
    for id in ids {
        query = query.bind(id);
    }

    Ok(query.fetch_all(pool).await?)
}

/// Duration-bounded scan for content dedup (spec §4.4): candidates within
/// ±10% of `target_duration_s`.
pub async fn scan_by_duration(
    pool: &SqlitePool,
    target_duration_s: f64,
) -> Result<Vec<FingerprintCandidate>> {
    let low = target_duration_s * 0.9;
    let high = target_duration_s * 1.1;

    let rows = sqlx::query_as::<_, FingerprintCandidate>(
        "SELECT id, content_fingerprint FROM tracks
         WHERE duration_seconds BETWEEN ? AND ?
         AND content_fingerprint IS NOT NULL",
    )
    .bind(low)
    .bind(high)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::migrations::run(&pool).await.unwrap();
        pool
    }

    fn sample_track(sha256: &str, duration_seconds: f64) -> Track {
        Track {
            id: Uuid::new_v4(),
            title: Some("Title".into()),
            artist: Some("Artist".into()),
            album: None,
            duration_seconds,
            sample_rate: Some(44100),
            channels: Some(2),
            bitrate: Some(320),
            format: Some("mp3".into()),
            sha256: sha256.to_string(),
            source_bytes: 1024,
            stored_path: format!("raw/{}/{}.mp3", &sha256[..2], sha256),
            content_fingerprint: Some(vec![1, 2, 3, 4]),
            exact_indexed: true,
            embedding_model: Some("laion/larger_clap_music_and_speech".into()),
            embedding_dim: Some(512),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn insert_then_select_round_trips() {
        let pool = setup_test_db().await;
        let track = sample_track("a".repeat(64).as_str(), 240.0);
        insert(&pool, &track).await.unwrap();

        let fetched = select_by_id(&pool, track.id).await.unwrap().unwrap();
        assert_eq!(fetched.sha256, track.sha256);
        assert_eq!(fetched.duration_seconds, 240.0);

        let by_hash = select_by_hash(&pool, &track.sha256).await.unwrap().unwrap();
        assert_eq!(by_hash.id, track.id);
    }

    #[tokio::test]
    async fn duplicate_sha256_is_rejected() {
        let pool = setup_test_db().await;
        let digest = "b".repeat(64);
        insert(&pool, &sample_track(&digest, 100.0)).await.unwrap();

        let err = insert(&pool, &sample_track(&digest, 100.0)).await.unwrap_err();
        assert!(matches!(err, crate::Error::Database(_)));
    }

    #[tokio::test]
    async fn duration_scan_respects_ten_percent_window() {
        let pool = setup_test_db().await;
        insert(&pool, &sample_track(&"c".repeat(64), 100.0)).await.unwrap();
        insert(&pool, &sample_track(&"d".repeat(64), 109.0)).await.unwrap();
        insert(&pool, &sample_track(&"e".repeat(64), 111.0)).await.unwrap();
        insert(&pool, &sample_track(&"f".repeat(64), 89.0)).await.unwrap();

        let candidates = scan_by_duration(&pool, 100.0).await.unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn select_by_ids_silently_drops_missing_ids() {
        let pool = setup_test_db().await;
        let track = sample_track(&"g".repeat(64), 50.0);
        insert(&pool, &track).await.unwrap();

        let found = select_by_ids(&pool, &[track.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, track.id);
    }
}
