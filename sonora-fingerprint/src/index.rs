//! Inverted landmark-hash index (spec §4.2), backed by `heed` — an
//! embedded LMDB binding, the literal "LMDB-style index" the spec names.
//!
//! Single-writer/multi-reader is LMDB's native transaction model: one
//! write transaction at a time, unlimited concurrent readers. The
//! `write_gate` mutex here only serializes *opening* a write transaction
//! (never held across an `.await` — these are synchronous calls, per
//! spec §9's TOCTOU note); readers never touch it.

use heed::types::{SerdeBincode, U32};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use sonora_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::landmarks::{extract_landmarks, hop_tolerance_sec};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HashEntry {
    track_id: Uuid,
    offset_sec: f32,
}

/// A query match before it's joined against C5: `(track_id, offset_sec,
/// aligned_hash_count)`, sorted by aligned-hash count descending (spec
/// §4.2's `query` contract).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub track_id: Uuid,
    pub offset_sec: f32,
    pub aligned_hashes: u32,
}

/// Embedded inverted fingerprint index.
pub struct FingerprintIndex {
    env: Env,
    hash_to_entries: Database<U32<heed::byteorder::BigEndian>, SerdeBincode<Vec<HashEntry>>>,
    track_to_hashes: Database<SerdeBincode<Uuid>, SerdeBincode<Vec<u32>>>,
    write_gate: Mutex<()>,
}

impl FingerprintIndex {
    /// Opens (creating if needed) the index at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(2 * 1024 * 1024 * 1024) // 2 GiB, ample for ~20k tracks of landmarks
                .max_dbs(2)
                .open(path)
        }
        .map_err(|e| Error::IndexUnavailable(format!("failed to open index at {}: {e}", path.display())))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        let hash_to_entries = env
            .create_database(&mut wtxn, Some("hash_to_entries"))
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        let track_to_hashes = env
            .create_database(&mut wtxn, Some("track_to_hashes"))
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        wtxn.commit().map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(Self {
            env,
            hash_to_entries,
            track_to_hashes,
            write_gate: Mutex::new(()),
        })
    }

    /// Idempotent per-track index (spec §4.2): re-indexing replaces the
    /// prior entry rather than accumulating duplicates.
    pub fn index(&self, pcm_16k: &[f32], track_id: Uuid) -> Result<()> {
        let landmarks = extract_landmarks(pcm_16k);

        let _guard = self.write_gate.lock().unwrap();
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        self.delete_locked(&mut wtxn, track_id)?;

        let mut by_hash: HashMap<u32, Vec<HashEntry>> = HashMap::new();
        let mut hashes_for_track = Vec::with_capacity(landmarks.len());
        for landmark in &landmarks {
            hashes_for_track.push(landmark.hash);
            by_hash.entry(landmark.hash).or_default().push(HashEntry {
                track_id,
                offset_sec: landmark.offset_sec,
            });
        }

        for (hash, mut new_entries) in by_hash {
            let mut entries = self
                .hash_to_entries
                .get(&wtxn, &hash)
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?
                .unwrap_or_default();
            entries.append(&mut new_entries);
            self.hash_to_entries
                .put(&mut wtxn, &hash, &entries)
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        }

        self.track_to_hashes
            .put(&mut wtxn, &track_id, &hashes_for_track)
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        wtxn.commit().map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Removes every hash entry attributed to `track_id`.
    pub fn delete(&self, track_id: Uuid) -> Result<()> {
        let _guard = self.write_gate.lock().unwrap();
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        self.delete_locked(&mut wtxn, track_id)?;
        wtxn.commit().map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        Ok(())
    }

    fn delete_locked(&self, wtxn: &mut heed::RwTxn, track_id: Uuid) -> Result<()> {
        let Some(hashes) = self
            .track_to_hashes
            .get(wtxn, &track_id)
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?
        else {
            return Ok(());
        };

        for hash in &hashes {
            if let Some(mut entries) = self
                .hash_to_entries
                .get(wtxn, hash)
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?
            {
                entries.retain(|e| e.track_id != track_id);
                if entries.is_empty() {
                    self.hash_to_entries
                        .delete(wtxn, hash)
                        .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
                } else {
                    self.hash_to_entries
                        .put(wtxn, hash, &entries)
                        .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
                }
            }
        }

        self.track_to_hashes
            .delete(wtxn, &track_id)
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Queries the index with a bag of landmarks extracted from
    /// `pcm_16k_f32`, returning candidates sorted by aligned-hash count
    /// descending (spec §4.2). Never errors on an empty/no-match index —
    /// only `INDEX_UNAVAILABLE` when the backing store itself is broken.
    pub fn query(&self, pcm_16k: &[f32]) -> Result<Vec<Candidate>> {
        let query_landmarks = extract_landmarks(pcm_16k);
        let tolerance = hop_tolerance_sec();

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        // track_id -> histogram of (offset_query - offset_db), bucketed to
        // one hop of tolerance, per spec §4.2's alignment algorithm.
        let mut histograms: HashMap<Uuid, HashMap<i64, u32>> = HashMap::new();

        for landmark in &query_landmarks {
            let Some(entries) = self
                .hash_to_entries
                .get(&rtxn, &landmark.hash)
                .map_err(|e| Error::IndexUnavailable(e.to_string()))?
            else {
                continue;
            };

            for entry in entries {
                // entry.offset_sec (indexed track position) minus
                // landmark.offset_sec (query-relative position) recovers the
                // track position the query clip was taken from, not its
                // negation.
                let delta = entry.offset_sec - landmark.offset_sec;
                let bucket = (delta / tolerance).round() as i64;
                *histograms
                    .entry(entry.track_id)
                    .or_default()
                    .entry(bucket)
                    .or_insert(0) += 1;
            }
        }

        let mut candidates: Vec<Candidate> = histograms
            .into_iter()
            .map(|(track_id, histogram)| {
                let (&best_bucket, &count) = histogram
                    .iter()
                    .max_by_key(|(_, count)| **count)
                    .expect("histogram is never empty once a track_id is inserted");
                Candidate {
                    track_id,
                    offset_sec: best_bucket as f32 * tolerance,
                    aligned_hashes: count,
                }
            })
            .collect();

        candidates.sort_by(|a, b| b.aligned_hashes.cmp(&a.aligned_hashes));
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn sine_wave(freq: f32, duration_s: f32) -> Vec<f32> {
        let rate = 16_000.0f32;
        let n = (duration_s * rate) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin() * 0.5)
            .collect()
    }

    #[test]
    #[serial]
    fn index_then_query_finds_exact_track() {
        let dir = tempdir().unwrap();
        let index = FingerprintIndex::open(dir.path()).unwrap();

        let track_id = Uuid::new_v4();
        let full_track = sine_wave(440.0, 30.0);
        index.index(&full_track, track_id).unwrap();

        let clip = &full_track[16_000 * 10..16_000 * 20];
        let candidates = index.query(clip).unwrap();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].track_id, track_id);
        assert!(candidates[0].aligned_hashes >= 20);
    }

    #[test]
    #[serial]
    fn reindexing_same_track_does_not_accumulate() {
        let dir = tempdir().unwrap();
        let index = FingerprintIndex::open(dir.path()).unwrap();

        let track_id = Uuid::new_v4();
        let track = sine_wave(300.0, 15.0);
        index.index(&track, track_id).unwrap();
        index.index(&track, track_id).unwrap();

        let candidates = index.query(&track[..16_000 * 5]).unwrap();
        let aligned = candidates
            .iter()
            .find(|c| c.track_id == track_id)
            .unwrap()
            .aligned_hashes;

        index.index(&track, track_id).unwrap();
        let candidates_again = index.query(&track[..16_000 * 5]).unwrap();
        let aligned_again = candidates_again
            .iter()
            .find(|c| c.track_id == track_id)
            .unwrap()
            .aligned_hashes;

        assert_eq!(aligned, aligned_again);
    }

    #[test]
    #[serial]
    fn delete_removes_all_hashes() {
        let dir = tempdir().unwrap();
        let index = FingerprintIndex::open(dir.path()).unwrap();

        let track_id = Uuid::new_v4();
        let track = sine_wave(250.0, 10.0);
        index.index(&track, track_id).unwrap();
        index.delete(track_id).unwrap();

        let candidates = index.query(&track).unwrap();
        assert!(candidates.iter().all(|c| c.track_id != track_id));
    }

    #[test]
    #[serial]
    fn empty_index_returns_empty_never_errors() {
        let dir = tempdir().unwrap();
        let index = FingerprintIndex::open(dir.path()).unwrap();
        let clip = sine_wave(500.0, 5.0);
        let candidates = index.query(&clip).unwrap();
        assert!(candidates.is_empty());
    }
}
