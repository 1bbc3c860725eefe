//! Configuration resolution.
//!
//! Follows the teacher's tiered resolution (CLI arg → environment variable →
//! TOML config file → compiled default), generalized from per-value lookups
//! to a single [`SearchConfig`] loaded once at startup.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Every item in spec §6's "Configuration surface" table, plus connection
/// strings for the relational and vector stores.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_upload_bytes: u64,
    pub min_query_duration_s: f64,
    pub max_query_duration_s: f64,

    pub exact_timeout_s: f64,
    pub vibe_timeout_s: f64,
    pub total_timeout_s: f64,

    pub exact_min_aligned_hashes: u32,
    pub exact_strong_match_hashes: u32,
    /// Open question in spec §9: sub-window sizing is configuration, not a
    /// constant. Defaults to the 3.5 s / 0.0-0.75-1.5 s variant the spec
    /// carries.
    pub exact_subwindow_duration_s: f64,
    pub exact_subwindow_starts_s: Vec<f64>,

    pub vibe_search_limit: usize,
    pub vibe_top_k_per_track: usize,
    pub vibe_diversity_weight: f32,
    pub vibe_score_threshold: f32,
    pub hnsw_ef: u64,

    pub embedding_model_id: String,
    pub embedding_model_path: PathBuf,
    pub embedding_dim: usize,
    pub chunk_window_s: f64,
    pub chunk_hop_s: f64,

    pub database_url: String,
    pub vector_store_url: String,
    pub vector_collection: String,
    pub raw_storage_dir: PathBuf,
    pub fingerprint_index_dir: PathBuf,

    pub http_host: String,
    pub http_port: u16,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            min_query_duration_s: 3.0,
            max_query_duration_s: 30.0,

            exact_timeout_s: 3.0,
            vibe_timeout_s: 4.0,
            total_timeout_s: 5.0,

            exact_min_aligned_hashes: 8,
            exact_strong_match_hashes: 20,
            exact_subwindow_duration_s: 3.5,
            exact_subwindow_starts_s: vec![0.0, 0.75, 1.5],

            vibe_search_limit: 50,
            vibe_top_k_per_track: 3,
            vibe_diversity_weight: 0.05,
            vibe_score_threshold: 0.60,
            hnsw_ef: 128,

            embedding_model_id: "laion/larger_clap_music_and_speech".to_string(),
            embedding_model_path: default_data_dir().join("models").join("clap_audio.onnx"),
            embedding_dim: 512,
            chunk_window_s: 10.0,
            chunk_hop_s: 5.0,

            database_url: "sqlite://sonora.db?mode=rwc".to_string(),
            vector_store_url: "http://127.0.0.1:6334".to_string(),
            vector_collection: "audio_embeddings".to_string(),
            raw_storage_dir: default_data_dir().join("raw"),
            fingerprint_index_dir: default_data_dir().join("exact_index"),

            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
        }
    }
}

impl SearchConfig {
    /// Resolve configuration: start from the compiled default, overlay a
    /// TOML file if present, then overlay `SONORA_*` environment variables.
    /// CLI overrides (`database_url`, `http_port`, ...) are applied by the
    /// caller after this returns, matching the teacher's "CLI arg wins"
    /// priority.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut cfg = SearchConfig::default();

        let path = config_path
            .map(PathBuf::from)
            .or_else(default_config_file);

        if let Some(path) = path {
            if path.exists() {
                let text = std::fs::read_to_string(&path)?;
                let file_cfg: SearchConfig = toml::from_str(&text)
                    .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))?;
                cfg = file_cfg;
            }
        }

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SONORA_DATABASE_URL") {
            self.database_url = v;
        }
        if let Ok(v) = std::env::var("SONORA_VECTOR_STORE_URL") {
            self.vector_store_url = v;
        }
        if let Ok(v) = std::env::var("SONORA_HTTP_PORT") {
            if let Ok(port) = v.parse() {
                self.http_port = port;
            }
        }
        if let Ok(v) = std::env::var("SONORA_RAW_STORAGE_DIR") {
            self.raw_storage_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SONORA_FINGERPRINT_INDEX_DIR") {
            self.fingerprint_index_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SONORA_EMBEDDING_MODEL_PATH") {
            self.embedding_model_path = PathBuf::from(v);
        }
    }
}

fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("sonora").join("config.toml"));
    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }
    let system_config = PathBuf::from("/etc/sonora/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }
    None
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sonora"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/sonora"))
}
