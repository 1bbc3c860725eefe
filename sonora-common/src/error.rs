//! Shared error taxonomy.
//!
//! Mirrors the four classes in spec §7: input errors (user-correctable),
//! resource errors (server-side, possibly transient), timeout errors, and
//! fatal errors (invariant violations). `ErrorCode` is the stable,
//! client-facing enum serialized in `{"error":{"code", ...}}` responses.

use thiserror::Error;

/// Common result type for sonora operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, client-facing error codes (spec §6, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileTooLarge,
    UnsupportedFormat,
    EmptyInput,
    AudioTooShort,
    DecodeFailed,
    ValidationError,
    IndexUnavailable,
    VectorStoreUnavailable,
    ModelNotLoaded,
    Busy,
    SearchTimeout,
    SearchUnavailable,
    Internal,
}

/// Errors shared across the decode/fingerprint/embed/ingest/search crates.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upload too large: {0}")]
    FileTooLarge(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("empty input")]
    EmptyInput,

    #[error("audio too short: {0}")]
    AudioTooShort(String),

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("fingerprint index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("vector store unavailable: {0}")]
    VectorStoreUnavailable(String),

    #[error("embedding model not loaded")]
    ModelNotLoaded,

    #[error("ingest already in progress")]
    Busy,

    #[error("search timed out: {0}")]
    SearchTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Maps this error onto the stable client-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::FileTooLarge(_) => ErrorCode::FileTooLarge,
            Error::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            Error::EmptyInput => ErrorCode::EmptyInput,
            Error::AudioTooShort(_) => ErrorCode::AudioTooShort,
            Error::DecodeFailed(_) => ErrorCode::DecodeFailed,
            Error::InvalidInput(_) => ErrorCode::ValidationError,
            Error::IndexUnavailable(_) => ErrorCode::IndexUnavailable,
            Error::VectorStoreUnavailable(_) => ErrorCode::VectorStoreUnavailable,
            Error::ModelNotLoaded => ErrorCode::ModelNotLoaded,
            Error::Busy => ErrorCode::Busy,
            Error::SearchTimeout(_) => ErrorCode::SearchTimeout,
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::NotFound(_) => {
                ErrorCode::Internal
            }
            Error::Internal(_) => ErrorCode::Internal,
        }
    }
}
