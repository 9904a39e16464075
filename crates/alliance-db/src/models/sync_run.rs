//! Sync run audit rows.
//!
//! One row per engine invocation. The `MAX(completed_at)` of completed runs
//! per type is the only source of the incremental cursor, so runs are never
//! edited after reaching a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use alliance_core::{RunStatus, SyncMode, SyncType};

/// Row-level outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunCounts {
    /// Remote records examined.
    pub processed: i32,
    /// New local rows inserted.
    pub created: i32,
    /// Existing rows whose fields actually changed.
    pub updated: i32,
    /// Rows soft-deleted this run.
    pub deactivated: i32,
    /// Soft-deleted rows brought back.
    pub reactivated: i32,
    /// Rows whose write failed.
    pub failed: i32,
}

/// One sync invocation's audit record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SyncRun {
    /// Run identifier.
    pub id: Uuid,

    /// Entity family the run covered.
    pub sync_type: String,

    /// `full` or `incremental` (after any silent downgrade).
    pub mode: String,

    /// `running`, `completed` or `failed`.
    pub status: String,

    /// Remote records examined.
    pub processed: i32,

    /// New local rows inserted.
    pub created: i32,

    /// Existing rows whose fields actually changed.
    pub updated: i32,

    /// Rows soft-deleted this run.
    pub deactivated: i32,

    /// Soft-deleted rows brought back.
    pub reactivated: i32,

    /// Rows whose write failed.
    pub failed: i32,

    /// Free-form JSON detail: exclusion reasons, per-group errors, cache
    /// efficiency.
    pub detail: Option<serde_json::Value>,

    /// Engine-level error for failed runs.
    pub error_message: Option<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    /// Open a new run in `running` state.
    pub async fn start(
        pool: &PgPool,
        sync_type: SyncType,
        mode: SyncMode,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO sync_runs (sync_type, mode, status)
            VALUES ($1, $2, 'running')
            RETURNING *
            ",
        )
        .bind(sync_type.as_str())
        .bind(mode.as_str())
        .fetch_one(pool)
        .await
    }

    /// Close a run as completed with its final counts and detail blob.
    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        counts: RunCounts,
        detail: serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE sync_runs
            SET status = 'completed', processed = $2, created = $3, updated = $4,
                deactivated = $5, reactivated = $6, failed = $7, detail = $8,
                completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(counts.processed)
        .bind(counts.created)
        .bind(counts.updated)
        .bind(counts.deactivated)
        .bind(counts.reactivated)
        .bind(counts.failed)
        .bind(detail)
        .fetch_one(pool)
        .await
    }

    /// Close a run as failed, keeping whatever counts had accumulated.
    pub async fn fail(
        pool: &PgPool,
        id: Uuid,
        counts: RunCounts,
        error_message: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE sync_runs
            SET status = 'failed', processed = $2, created = $3, updated = $4,
                deactivated = $5, reactivated = $6, failed = $7,
                error_message = $8, completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(counts.processed)
        .bind(counts.created)
        .bind(counts.updated)
        .bind(counts.deactivated)
        .bind(counts.reactivated)
        .bind(counts.failed)
        .bind(error_message)
        .fetch_one(pool)
        .await
    }

    /// The incremental cursor: completion time of the most recent completed
    /// run of this type. `None` when no run has ever completed, which
    /// silently downgrades the caller to full mode.
    pub async fn last_successful(
        pool: &PgPool,
        sync_type: SyncType,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT MAX(completed_at) FROM sync_runs
            WHERE sync_type = $1 AND status = $2
            ",
        )
        .bind(sync_type.as_str())
        .bind(RunStatus::Completed.as_str())
        .fetch_one(pool)
        .await
    }

    /// Most recent runs, newest first, for the status surface.
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM sync_runs ORDER BY started_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
