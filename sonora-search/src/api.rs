//! C10 Search Orchestrator (spec §4.8): the `axum` HTTP surface — the
//! synchronous `/api/v1/search` endpoint and a thin `/api/v1/ingest` proxy.
//!
//! Grounded on `wkmp-dr`'s handler style (`State<AppState>` extractor,
//! `IntoResponse` error wrapper) and `itsmontoya-scribble`'s multipart
//! upload handling (`Multipart` extractor, field-name lookup, `AppError`).

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use sonora_common::{Error, ErrorCode};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::exact::{run_exact, ExactMatch};
use crate::vibe::{run_vibe, VibeMatch};
use crate::AppState;

const MIN_VALID_FORMATS: &[&str] = &["webm", "ogg", "mp3", "mp4", "wav"];

pub fn router(state: AppState) -> Router {
    let body_limit = (state.config.max_upload_bytes as usize).saturating_add(4096);
    Router::new()
        .route("/api/v1/search", post(search))
        .route("/api/v1/ingest", post(ingest))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Exact,
    Vibe,
    Both,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Both
    }
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Exact => "exact",
            Mode::Vibe => "vibe",
            Mode::Both => "both",
        }
    }
}

#[derive(Debug, Serialize)]
struct ExactMatchDto {
    track_id: Uuid,
    title: Option<String>,
    artist: Option<String>,
    confidence: f32,
    offset_seconds: Option<f64>,
    aligned_hashes: u32,
}

impl From<ExactMatch> for ExactMatchDto {
    fn from(m: ExactMatch) -> Self {
        Self {
            track_id: m.track.id,
            title: m.track.title,
            artist: m.track.artist,
            confidence: m.confidence,
            offset_seconds: m.offset_seconds,
            aligned_hashes: m.aligned_hashes,
        }
    }
}

#[derive(Debug, Serialize)]
struct VibeMatchDto {
    track_id: Uuid,
    title: Option<String>,
    artist: Option<String>,
    similarity: f32,
    embedding_model: String,
}

impl From<VibeMatch> for VibeMatchDto {
    fn from(m: VibeMatch) -> Self {
        Self {
            track_id: m.track.id,
            title: m.track.title,
            artist: m.track.artist,
            similarity: m.similarity,
            embedding_model: m.embedding_model,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    request_id: Uuid,
    query_duration_ms: u64,
    exact_matches: Vec<ExactMatchDto>,
    vibe_matches: Vec<VibeMatchDto>,
    mode_used: &'static str,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    track_id: Option<Uuid>,
    title: Option<String>,
    artist: Option<String>,
    status: &'static str,
}

/// Maps the shared error taxonomy onto HTTP status + stable error code,
/// per spec §7's propagation policy and §6's status-code table.
struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: ErrorCode::SearchUnavailable,
            message: message.into(),
        }
    }

    fn from_error(err: Error) -> Self {
        let status = match err.code() {
            ErrorCode::FileTooLarge
            | ErrorCode::EmptyInput
            | ErrorCode::AudioTooShort
            | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::UnsupportedFormat | ErrorCode::DecodeFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Busy => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::SearchTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::IndexUnavailable | ErrorCode::VectorStoreUnavailable | ErrorCode::SearchUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCode::ModelNotLoaded | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default)]
struct SearchForm {
    audio: Vec<u8>,
    mode: Mode,
    max_results: usize,
}

async fn parse_search_form(multipart: &mut Multipart) -> std::result::Result<SearchForm, ApiError> {
    let mut form = SearchForm {
        max_results: 10,
        ..Default::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_error(Error::InvalidInput(e.to_string())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                form.audio = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::from_error(Error::InvalidInput(e.to_string())))?
                    .to_vec();
            }
            "mode" => {
                let text = field.text().await.unwrap_or_default();
                form.mode = match text.to_ascii_lowercase().as_str() {
                    "exact" => Mode::Exact,
                    "vibe" => Mode::Vibe,
                    _ => Mode::Both,
                };
            }
            "max_results" => {
                let text = field.text().await.unwrap_or_default();
                if let Ok(n) = text.parse::<usize>() {
                    form.max_results = n.clamp(1, 50);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn search(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    let form = parse_search_form(&mut multipart).await?;

    // Gate 1: upload size.
    if form.audio.len() as u64 > state.config.max_upload_bytes {
        return Err(ApiError::from_error(Error::FileTooLarge(format!(
            "{} bytes exceeds the {} byte limit",
            form.audio.len(),
            state.config.max_upload_bytes
        ))));
    }

    // Gate 2: magic-byte content type.
    let sniffed = sonora_decode::sniff_format(&form.audio);
    if !matches!(sniffed, Some(fmt) if MIN_VALID_FORMATS.contains(&fmt)) {
        return Err(ApiError::from_error(Error::UnsupportedFormat(format!(
            "{sniffed:?} is not one of {MIN_VALID_FORMATS:?}"
        ))));
    }

    // Gate 3: non-empty.
    if form.audio.is_empty() {
        return Err(ApiError::from_error(Error::EmptyInput));
    }

    // Gate 4: shared dual-rate decode.
    let (pcm_16k, pcm_48k) = sonora_decode::decode_dual(&form.audio)
        .await
        .map_err(ApiError::from_error)?;
    let received_at = Instant::now();

    // Gate 5: duration bounds, with truncation rather than rejection above.
    let duration_s = sonora_decode::pcm_duration_seconds(pcm_16k.len(), 16_000);
    if duration_s < state.config.min_query_duration_s {
        return Err(ApiError::from_error(Error::AudioTooShort(format!(
            "{duration_s:.2}s is below the {:.2}s minimum",
            state.config.min_query_duration_s
        ))));
    }

    let pcm_16k = truncate_to_seconds(pcm_16k, state.config.max_query_duration_s, 16_000);
    let pcm_48k = truncate_to_seconds(pcm_48k, state.config.max_query_duration_s, 48_000);

    let request_id = Uuid::new_v4();
    let max_results = form.max_results;

    let (exact_matches, vibe_matches) = match form.mode {
        Mode::Exact => {
            let matches = run_lane_with_timeout(
                Duration::from_secs_f64(state.config.exact_timeout_s),
                run_exact(
                    &state.pool,
                    &state.fingerprint_index,
                    &state.config,
                    pcm_16k,
                    max_results,
                ),
            )
            .await?;
            (matches, Vec::new())
        }
        Mode::Vibe => {
            let matches = run_lane_with_timeout(
                Duration::from_secs_f64(state.config.vibe_timeout_s),
                run_vibe(
                    &state.pool,
                    &state.embedding_model,
                    &state.vector_store,
                    &state.config,
                    pcm_48k,
                    max_results,
                    None,
                ),
            )
            .await?;
            (Vec::new(), matches)
        }
        Mode::Both => run_both(&state, pcm_16k, pcm_48k, max_results).await?,
    };

    let query_duration_ms = received_at.elapsed().as_millis() as u64;

    info!(
        request_id = %request_id,
        mode = form.mode.as_str(),
        exact_count = exact_matches.len(),
        vibe_count = vibe_matches.len(),
        query_duration_ms,
        "search request complete"
    );

    Ok(Json(SearchResponse {
        request_id,
        query_duration_ms,
        exact_matches: exact_matches.into_iter().map(ExactMatchDto::from).collect(),
        vibe_matches: vibe_matches.into_iter().map(VibeMatchDto::from).collect(),
        mode_used: form.mode.as_str(),
    }))
}

fn truncate_to_seconds(pcm: Vec<f32>, max_seconds: f64, sample_rate: usize) -> Vec<f32> {
    let max_samples = (max_seconds * sample_rate as f64) as usize;
    let mut pcm = pcm;
    pcm.truncate(max_samples.max(1).min(pcm.len().max(1)));
    pcm
}

/// Single-lane dispatch (`mode = exact` or `mode = vibe`): await under one
/// timeout, mapping a timeout to a typed error so the caller can decide
/// between 504 and 503 (spec §4.8/§7).
async fn run_lane_with_timeout<T, Fut>(timeout: Duration, fut: Fut) -> std::result::Result<Vec<T>, ApiError>
where
    Fut: std::future::Future<Output = sonora_common::Result<Vec<T>>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(matches)) => Ok(matches),
        Ok(Err(e)) => Err(ApiError::from_error(e)),
        Err(_) => Err(ApiError::from_error(Error::SearchTimeout(
            "lane exceeded its timeout".to_string(),
        ))),
    }
}

enum LaneOutcome<T> {
    Ok(Vec<T>),
    TimedOut,
    Failed,
}

async fn await_lane<T: Send + 'static>(
    mut handle: JoinHandle<sonora_common::Result<Vec<T>>>,
    timeout: Duration,
) -> LaneOutcome<T> {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(matches))) => LaneOutcome::Ok(matches),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "lane failed in 'both' mode, demoting to empty result");
            LaneOutcome::Failed
        }
        Ok(Err(join_err)) => {
            error!(error = %join_err, "lane task panicked in 'both' mode");
            LaneOutcome::Failed
        }
        Err(_) => {
            handle.abort();
            LaneOutcome::TimedOut
        }
    }
}

/// `mode = both`: runs both lanes as independent tasks under their own
/// timeouts and cancels whichever is still running once the other settles
/// (spec §4.8's dispatch/partial-result policy).
async fn run_both(
    state: &AppState,
    pcm_16k: Vec<f32>,
    pcm_48k: Vec<f32>,
    max_results: usize,
) -> std::result::Result<(Vec<ExactMatch>, Vec<VibeMatch>), ApiError> {
    let exact_timeout = Duration::from_secs_f64(state.config.exact_timeout_s);
    let vibe_timeout = Duration::from_secs_f64(state.config.vibe_timeout_s);

    let exact_handle: JoinHandle<sonora_common::Result<Vec<ExactMatch>>> = {
        let pool = state.pool.clone();
        let index = state.fingerprint_index.clone();
        let config = state.config.clone();
        tokio::spawn(async move { run_exact(&pool, &index, &config, pcm_16k, max_results).await })
    };

    let vibe_handle: JoinHandle<sonora_common::Result<Vec<VibeMatch>>> = {
        let pool = state.pool.clone();
        let embedding_model = state.embedding_model.clone();
        let vector_store = state.vector_store.clone();
        let config = state.config.clone();
        tokio::spawn(async move {
            run_vibe(&pool, &embedding_model, &vector_store, &config, pcm_48k, max_results, None).await
        })
    };

    let (exact_outcome, vibe_outcome) = tokio::join!(
        await_lane(exact_handle, exact_timeout),
        await_lane(vibe_handle, vibe_timeout),
    );

    let exact_ok = matches!(exact_outcome, LaneOutcome::Ok(_));
    let vibe_ok = matches!(vibe_outcome, LaneOutcome::Ok(_));

    // If neither lane produced a result, this isn't a partial result — it's
    // total failure, and must surface as an error rather than an empty 200.
    if !exact_ok && !vibe_ok {
        let both_timed_out =
            matches!(exact_outcome, LaneOutcome::TimedOut) && matches!(vibe_outcome, LaneOutcome::TimedOut);
        return Err(if both_timed_out {
            ApiError::from_error(Error::SearchTimeout("both lanes timed out".to_string()))
        } else {
            ApiError::unavailable("no search lane produced a result")
        });
    }

    let exact_matches = match exact_outcome {
        LaneOutcome::Ok(matches) => matches,
        _ => Vec::new(),
    };
    let vibe_matches = match vibe_outcome {
        LaneOutcome::Ok(matches) => matches,
        _ => Vec::new(),
    };
    Ok((exact_matches, vibe_matches))
}

async fn ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<IngestResponse>, ApiError> {
    let mut audio = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_error(Error::InvalidInput(e.to_string())))?
    {
        if field.name() == Some("audio") {
            audio = field
                .bytes()
                .await
                .map_err(|e| ApiError::from_error(Error::InvalidInput(e.to_string())))?
                .to_vec();
        }
    }

    let result = sonora_ingest::ingest(&state.ingest_ctx, audio)
        .await
        .map_err(ApiError::from_error)?;

    let status = match result.status {
        sonora_ingest::IngestStatus::Ingested => "INGESTED",
        sonora_ingest::IngestStatus::Duplicate => "DUPLICATE",
        sonora_ingest::IngestStatus::Skipped => "SKIPPED",
        sonora_ingest::IngestStatus::Error => "ERROR",
    };

    Ok(Json(IngestResponse {
        track_id: result.track_id,
        title: result.title,
        artist: result.artist,
        status,
    }))
}
