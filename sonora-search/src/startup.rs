//! C11 Model Lifecycle (spec §4.9): the ordered startup sequence and a
//! matching shutdown, grounded on `wkmp-ap/src/main.rs`'s
//! config-then-pool-then-engine-then-listen ordering.

use crate::api;
use crate::AppState;
use sonora_common::config::SearchConfig;
use sonora_common::Result;
use sonora_embed::EmbeddingModel;
use sonora_fingerprint::FingerprintIndex;
use sonora_ingest::IngestContext;
use sonora_vector::{CollectionSchema, VectorStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

/// Builds every collaborator in the order spec §4.9 requires: verify the
/// relational store, verify the vector store and make sure its collection
/// exists, load the embedding model and warm it up, only then bind a
/// listener. A failure at any step aborts startup rather than serving a
/// half-initialized process.
pub async fn build_state(config: &SearchConfig) -> Result<AppState> {
    let started = Instant::now();

    let pool = sonora_common::db::connect(&config.database_url).await?;
    info!("connected to relational store");

    let fingerprint_index = Arc::new(FingerprintIndex::open(&config.fingerprint_index_dir)?);
    info!("fingerprint index opened");

    let vector_store = Arc::new(VectorStore::connect(&config.vector_store_url, &config.vector_collection).await?);
    vector_store.verify_reachable().await?;
    vector_store
        .ensure_collection(&CollectionSchema::for_collection(&config.vector_collection))
        .await?;
    info!("vector store reachable, collection ensured");

    let embedding_model = Arc::new(EmbeddingModel::load(
        &config.embedding_model_path,
        config.embedding_model_id.clone(),
    )?);
    embedding_model.warm_up().await?;
    info!(
        cold_start_ms = started.elapsed().as_millis() as u64,
        "embedding model loaded and warmed up"
    );

    let ingest_ctx = Arc::new(IngestContext::new(
        pool.clone(),
        config.raw_storage_dir.clone(),
        Arc::clone(&fingerprint_index),
        Arc::clone(&embedding_model),
        Arc::clone(&vector_store),
        config.clone(),
    ));

    Ok(AppState {
        pool,
        fingerprint_index,
        embedding_model,
        vector_store,
        config: config.clone(),
        ingest_ctx,
    })
}

/// Binds and serves until the process receives a shutdown signal, then
/// releases the pool and vector client (spec §4.9's shutdown sequence).
pub async fn serve(config: &SearchConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| sonora_common::Error::Config(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "listening");

    let pool = state.pool.clone();
    let router = api::router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| sonora_common::Error::Internal(format!("server error: {e}")))?;

    pool.close().await;
    info!("relational store connection pool closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
