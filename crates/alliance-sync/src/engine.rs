//! Engine facade and run lifecycle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use alliance_core::{ProgressReporter, SyncMode, SyncSettings, SyncType};
use alliance_db::SyncRun;
use alliance_lms::LmsClient;
use alliance_prm::PrmClient;

use crate::error::{SyncError, SyncResult};
use crate::session::SyncSession;
use crate::stats::SyncStats;

/// The result of one sync run: the audit row plus the in-memory statistics
/// the trigger surface returns to callers.
#[derive(Debug)]
pub struct SyncOutcome {
    /// The completed audit row.
    pub run: SyncRun,
    /// Full statistics, including exclusion reasons and row-level errors.
    pub stats: SyncStats,
}

/// Orchestrates reconciliation between the PRM, the LMS and the local
/// store. Public operations are spread across the per-entity modules; this
/// type owns the shared wiring.
pub struct SyncEngine {
    pool: PgPool,
    prm: PrmClient,
    lms: LmsClient,
    settings: SyncSettings,
    progress: ProgressReporter,
}

impl SyncEngine {
    /// Creates an engine with progress reporting disabled.
    #[must_use]
    pub fn new(pool: PgPool, prm: PrmClient, lms: LmsClient, settings: SyncSettings) -> Self {
        Self {
            pool,
            prm,
            lms,
            settings,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Attaches a progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn prm(&self) -> &PrmClient {
        &self.prm
    }

    pub(crate) fn lms(&self) -> &LmsClient {
        &self.lms
    }

    /// The engine's configuration.
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub(crate) fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Creates a session sized from the configured TTL, replacing (and
    /// logging) any unexpired previous session the caller still holds.
    #[must_use]
    pub fn new_session(&self, previous: Option<&SyncSession>) -> SyncSession {
        SyncSession::replacing(
            previous,
            Uuid::new_v4().to_string(),
            Duration::from_secs(self.settings.session_ttl_minutes * 60),
        )
    }

    /// Resolves the effective mode and incremental cursor for a run.
    ///
    /// Incremental mode with no prior completed run of this type silently
    /// downgrades to full; an empty audit table is not an error.
    pub(crate) async fn resolve_mode(
        &self,
        requested: SyncMode,
        sync_type: SyncType,
    ) -> SyncResult<(SyncMode, Option<DateTime<Utc>>)> {
        match requested {
            SyncMode::Full => Ok((SyncMode::Full, None)),
            SyncMode::Incremental => {
                match SyncRun::last_successful(&self.pool, sync_type).await? {
                    Some(cursor) => Ok((SyncMode::Incremental, Some(cursor))),
                    None => {
                        info!(
                            sync_type = %sync_type,
                            "No completed run found, downgrading to full mode"
                        );
                        Ok((SyncMode::Full, None))
                    }
                }
            }
        }
    }

    /// Closes a run as completed and assembles the outcome.
    pub(crate) async fn finish_run(
        &self,
        run_id: Uuid,
        stats: SyncStats,
    ) -> SyncResult<SyncOutcome> {
        let run = SyncRun::complete(&self.pool, run_id, stats.counts(), stats.detail()).await?;
        info!(
            run_id = %run.id,
            sync_type = %run.sync_type,
            processed = stats.processed,
            created = stats.created,
            updated = stats.updated,
            deactivated = stats.deactivated,
            reactivated = stats.reactivated,
            failed = stats.failed,
            "Sync run completed"
        );
        Ok(SyncOutcome { run, stats })
    }

    /// Marks a run failed, best effort: a failure writing the audit row is
    /// logged rather than masking the original error.
    pub(crate) async fn fail_run(&self, run_id: Uuid, stats: &SyncStats, error: &SyncError) {
        if let Err(db_error) =
            SyncRun::fail(&self.pool, run_id, stats.counts(), &error.to_string()).await
        {
            tracing::error!(
                run_id = %run_id,
                error = %db_error,
                "Could not record failed sync run"
            );
        }
    }

    /// Runs the whole chain — partners, contacts, LMS users, groups,
    /// enrollments — sharing one session cache.
    #[instrument(skip(self))]
    pub async fn run_chain(&self, mode: SyncMode) -> SyncResult<Vec<SyncOutcome>> {
        let mut session = self.new_session(None);
        let mut outcomes = Vec::with_capacity(5);

        outcomes.push(self.sync_partners(mode).await?);
        outcomes.push(self.sync_contacts(mode).await?);
        outcomes.push(self.sync_lms_users(mode, &mut session).await?);
        outcomes.push(self.sync_lms_groups(&mut session).await?);
        outcomes.push(self.sync_enrollments(mode, &mut session).await?);

        let cache = session.stats();
        info!(
            session_id = %session.id(),
            cache_hits = cache.hits,
            cache_misses = cache.misses,
            "Sync chain completed"
        );
        Ok(outcomes)
    }

    /// Recent audit rows, newest first, for the status surface.
    pub async fn recent_runs(&self, limit: i64) -> SyncResult<Vec<SyncRun>> {
        Ok(SyncRun::recent(&self.pool, limit).await?)
    }
}
