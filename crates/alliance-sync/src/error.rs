//! Error types for the reconciliation engine.

use thiserror::Error;

use alliance_lms::LmsError;
use alliance_prm::PrmError;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Engine-level failures.
///
/// Row-level write failures never surface here; they are accumulated into
/// the run's statistics. A `SyncError` means the run itself could not start
/// or had to stop.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure outside row-level processing.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    /// PRM client failure (first-page fetch, health gate).
    #[error("PRM error: {0}")]
    Prm(#[from] PrmError),

    /// LMS client failure (first-page fetch, health gate).
    #[error("LMS error: {0}")]
    Lms(#[from] LmsError),

    /// Detail blob serialization failure.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced entity does not exist locally.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The mid-run error-rate abort tripped.
    #[error("Sync aborted: {0}")]
    Aborted(String),
}
