//! Small time helpers shared across crates.

use chrono::{DateTime, Utc};

/// Current UTC timestamp, used for `created_at`/`updated_at` columns.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
