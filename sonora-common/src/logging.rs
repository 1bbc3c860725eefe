//! Tracing subscriber initialization, shared by every sonora binary.

/// Initializes a `tracing` subscriber with an env-filter defaulting to
/// `info`, matching the teacher's `wkmp-ap`/`wkmp-ai` startup sequence.
pub fn init(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with_target(true)
        .init();
}
