//! Schema migrations for the `tracks` table.
//!
//! Versioned and idempotent, following the teacher's `schema_version`
//! tracking table convention: each migration is a numbered function, never
//! edited after release, with new schema changes landing as a new migration.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

const CURRENT_SCHEMA_VERSION: i32 = 1;

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

async fn record_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Runs every migration not yet applied to `pool`.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    let mut version = get_schema_version(pool).await?;

    if version < 1 {
        migrate_v1(pool).await?;
        record_version(pool, 1).await?;
        version = 1;
        info!("applied schema migration v1 (tracks table)");
    }

    let _ = version;
    Ok(())
}

/// v1: the `tracks` table (spec §3, §6). `sha256` carries a unique index
/// (invariant: at most one row per digest); `created_at` is indexed for the
/// admin ingest-history boundary.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id                  TEXT PRIMARY KEY,
            title               TEXT,
            artist              TEXT,
            album               TEXT,
            duration_seconds    REAL NOT NULL,
            sample_rate         INTEGER,
            channels            INTEGER,
            bitrate             INTEGER,
            format              TEXT,
            sha256              TEXT NOT NULL,
            source_bytes        INTEGER NOT NULL,
            stored_path         TEXT NOT NULL,
            content_fingerprint BLOB,
            exact_indexed       INTEGER NOT NULL DEFAULT 0,
            embedding_model     TEXT,
            embedding_dim       INTEGER,
            created_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_tracks_sha256 ON tracks (sha256)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_created_at ON tracks (created_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_duration ON tracks (duration_seconds)")
        .execute(pool)
        .await?;

    Ok(())
}
