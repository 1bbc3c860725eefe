//! Database models and migrations for the authoritative `tracks` table (C5).

pub mod init;
pub mod migrations;
pub mod models;
pub mod tracks;

pub use init::connect;
pub use models::Track;
pub use tracks::FingerprintCandidate;
