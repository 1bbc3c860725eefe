//! Content-addressed raw-byte storage (spec §4.5 step 2, §6 "Persisted
//! state layout"): `raw/<digest[0:2]>/<digest>.<ext>`, idempotent.

use sonora_common::Result;
use std::path::{Path, PathBuf};

/// Computes the storage path for a digest/extension pair without touching
/// the filesystem — used both to persist and to locate existing bytes.
pub fn path_for(raw_dir: &Path, sha256: &str, ext: &str) -> PathBuf {
    let fan_out = &sha256[..2.min(sha256.len())];
    raw_dir.join(fan_out).join(format!("{sha256}.{ext}"))
}

/// Persists `bytes` at the content-addressed path, creating the fan-out
/// directory if needed. Idempotent: writing the same digest twice is a
/// no-op after the first write.
pub async fn persist(raw_dir: &Path, sha256: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
    let dest = path_for(raw_dir, sha256, ext);

    if dest.exists() {
        return Ok(dest);
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(&dest, bytes).await?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn path_for_uses_first_two_hex_chars_as_fan_out() {
        let dir = PathBuf::from("/data/raw");
        let path = path_for(&dir, "abcdef1234", "mp3");
        assert_eq!(path, PathBuf::from("/data/raw/ab/abcdef1234.mp3"));
    }

    #[tokio::test]
    async fn persist_writes_bytes_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let sha = "deadbeef".repeat(8);
        let bytes = b"hello world".to_vec();

        let path_a = persist(dir.path(), &sha, "wav", &bytes).await.unwrap();
        assert!(path_a.exists());
        assert_eq!(tokio::fs::read(&path_a).await.unwrap(), bytes);

        let path_b = persist(dir.path(), &sha, "wav", &bytes).await.unwrap();
        assert_eq!(path_a, path_b);
    }
}
