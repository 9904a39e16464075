//! Enrollment sync.
//!
//! Per-user transcript fetches are the most numerous remote calls in the
//! system, so incremental mode narrows the user set aggressively and a
//! small bounded pool runs the fetches concurrently. Results are folded in
//! the original candidate order, never completion order, so run output does
//! not depend on request timing.
//!
//! A 404 for a user is expected churn (deactivated or deleted upstream
//! between fetches): it advances the user's cursor and is counted apart
//! from real API errors. The run aborts only when errors exceed ten and
//! outnumber successes, which separates a systemic outage from sporadic
//! noise.

use std::collections::{HashMap, HashSet};

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use tracing::{debug, instrument};

use alliance_core::{SyncMode, SyncType};
use alliance_db::{
    Course, Enrollment, EnrollmentStatus, LmsUser, SyncRun, UpsertCourse, UpsertEnrollment,
};
use alliance_lms::{LmsCourseRecord, LmsEnrollmentRecord, LmsFetchOutcome, LmsResult};

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::{SyncError, SyncResult};
use crate::session::SyncSession;
use crate::stats::SyncStats;

impl SyncEngine {
    /// Syncs course enrollments for users due a refresh.
    #[instrument(skip(self, session))]
    pub async fn sync_enrollments(
        &self,
        mode: SyncMode,
        session: &mut SyncSession,
    ) -> SyncResult<SyncOutcome> {
        let (mode, _) = self.resolve_mode(mode, SyncType::Enrollments).await?;
        let run = SyncRun::start(self.pool(), SyncType::Enrollments, mode).await?;
        let mut stats = SyncStats::new();

        match self.sync_enrollments_inner(mode, session, &mut stats).await {
            Ok(()) => self.finish_run(run.id, stats).await,
            Err(error) => {
                self.fail_run(run.id, &stats, &error).await;
                Err(error)
            }
        }
    }

    async fn sync_enrollments_inner(
        &self,
        mode: SyncMode,
        session: &mut SyncSession,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        self.lms().ensure_healthy()?;

        let mut course_ids = self.mirror_courses(session, stats).await?;

        let candidates = match mode {
            SyncMode::Full => LmsUser::list_active(self.pool()).await?,
            SyncMode::Incremental => {
                let stale_before =
                    Utc::now() - ChronoDuration::days(self.settings().enrollment_staleness_days);
                LmsUser::enrollment_candidates(self.pool(), stale_before).await?
            }
        };

        debug!(candidates = candidates.len(), "Selected users for enrollment sync");

        let total = candidates.len();
        let concurrency = self.settings().enrollment_concurrency.max(1);
        let mut position = 0usize;

        for chunk in candidates.chunks(concurrency) {
            let fetches: Vec<LmsResult<LmsFetchOutcome>> = join_all(
                chunk
                    .iter()
                    .map(|user| self.lms().fetch_user_enrollments(&user.lms_id)),
            )
            .await;

            // Fold in candidate order, not completion order.
            for (user, result) in chunk.iter().zip(fetches) {
                position += 1;
                self.progress().report(
                    "enrollments:users",
                    position,
                    total,
                    Some(user.email.clone()),
                );

                match result {
                    Err(error) if error.is_not_found() => {
                        stats.users_not_found += 1;
                        if let Err(db_error) =
                            LmsUser::set_enrollment_synced(self.pool(), &user.lms_id, Utc::now())
                                .await
                        {
                            stats.record_error(&format!("cursor for {}", user.email), &db_error);
                        }
                    }
                    Err(error) => {
                        stats.api_errors += 1;
                        stats
                            .errors
                            .push(format!("enrollments for {}: {error}", user.email));
                        self.check_abort(stats)?;
                    }
                    Ok(fetch) => {
                        let complete = fetch.is_complete();
                        if let Some(error) = &fetch.partial_error {
                            stats.api_errors += 1;
                            stats
                                .errors
                                .push(format!("partial enrollments for {}: {error}", user.email));
                            self.check_abort(stats)?;
                        }

                        self.apply_user_enrollments(user, &fetch, &mut course_ids, stats)
                            .await;
                        stats.successes += 1;

                        // A partial transcript list must not advance the
                        // cursor, or the missed rows would wait out the
                        // staleness window.
                        if complete {
                            if let Err(db_error) = LmsUser::set_enrollment_synced(
                                self.pool(),
                                &user.lms_id,
                                Utc::now(),
                            )
                            .await
                            {
                                stats
                                    .record_error(&format!("cursor for {}", user.email), &db_error);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn check_abort(&self, stats: &SyncStats) -> SyncResult<()> {
        let threshold = self.settings().enrollment_error_abort;
        if stats.api_errors > threshold && stats.api_errors > stats.successes {
            return Err(SyncError::Aborted(format!(
                "{} API errors against {} successes",
                stats.api_errors, stats.successes
            )));
        }
        Ok(())
    }

    /// Mirrors the course catalog and returns the known course id set.
    async fn mirror_courses(
        &self,
        session: &mut SyncSession,
        stats: &mut SyncStats,
    ) -> SyncResult<HashSet<String>> {
        let records: Vec<LmsCourseRecord> = if let Some(cached) = session.courses() {
            debug!(count = cached.len(), "Using cached LMS courses");
            cached.to_vec()
        } else {
            let fetch = self.lms().fetch_collection("courses", None).await?;
            let complete_fetch = fetch.is_complete();
            if let Some(error) = &fetch.partial_error {
                stats.api_errors += 1;
                stats.errors.push(format!("partial course fetch: {error}"));
            }

            let mut records = Vec::with_capacity(fetch.records.len());
            for value in &fetch.records {
                match LmsCourseRecord::from_json(value) {
                    Ok(record) => records.push(record),
                    Err(error) => stats.record_error("course mapping", &error),
                }
            }
            if complete_fetch {
                session.set_courses(records.clone());
            }
            records
        };

        for record in &records {
            if let Err(error) = Course::upsert(
                self.pool(),
                &UpsertCourse {
                    lms_id: record.lms_id.clone(),
                    name: record.name.clone(),
                    npcu: record.npcu,
                    is_active: record.is_active,
                },
            )
            .await
            {
                stats.record_error(&format!("course {}", record.name), &error);
            }
        }

        let mut course_ids: HashSet<String> =
            Course::list_ids(self.pool()).await?.into_iter().collect();
        course_ids.extend(records.into_iter().map(|record| record.lms_id));
        Ok(course_ids)
    }

    /// Upserts one user's transcript rows; row-level failures accumulate.
    async fn apply_user_enrollments(
        &self,
        user: &LmsUser,
        fetch: &LmsFetchOutcome,
        course_ids: &mut HashSet<String>,
        stats: &mut SyncStats,
    ) {
        let existing: HashMap<String, Enrollment> =
            match Enrollment::for_user(self.pool(), &user.lms_id).await {
                Ok(rows) => rows
                    .into_iter()
                    .map(|row| (row.transcript_id.clone(), row))
                    .collect(),
                Err(error) => {
                    stats.record_error(&format!("loading enrollments for {}", user.email), &error);
                    return;
                }
            };

        for value in &fetch.records {
            let record = match LmsEnrollmentRecord::from_json(value) {
                Ok(record) => record,
                Err(error) => {
                    stats.record_error("enrollment mapping", &error);
                    continue;
                }
            };

            if !course_ids.contains(&record.course_id) {
                // Transcripts can reference courses the catalog fetch never
                // returned (retired or unlisted); backfill one at a time.
                match self.backfill_course(&record.course_id).await {
                    Ok(()) => {
                        course_ids.insert(record.course_id.clone());
                    }
                    Err(error) => {
                        stats.record_error(
                            &format!("course {} for transcript {}", record.course_id, record.transcript_id),
                            &error,
                        );
                        continue;
                    }
                }
            }

            let data = UpsertEnrollment {
                transcript_id: record.transcript_id.clone(),
                lms_user_id: user.lms_id.clone(),
                course_id: record.course_id.clone(),
                status: EnrollmentStatus::from_progress(record.percent, record.completed),
                percent_complete: record.percent,
                score: record.score,
                enrolled_at: record.enrolled_at,
                completed_at: record.completed_at,
                expires_at: record.expires_at,
            };

            stats.processed += 1;
            match existing.get(&record.transcript_id) {
                Some(row) if !row.differs_from(&data) => {}
                Some(_) => match Enrollment::upsert(self.pool(), &data).await {
                    Ok(_) => stats.updated += 1,
                    Err(error) => {
                        stats.record_error(&format!("transcript {}", record.transcript_id), &error);
                    }
                },
                None => match Enrollment::upsert(self.pool(), &data).await {
                    Ok(_) => stats.created += 1,
                    Err(error) => {
                        stats.record_error(&format!("transcript {}", record.transcript_id), &error);
                    }
                },
            }
        }
    }

    async fn backfill_course(&self, course_id: &str) -> SyncResult<()> {
        let value = self.lms().get_one(&format!("courses/{course_id}")).await?;
        let record = LmsCourseRecord::from_json(&value)?;
        Course::upsert(
            self.pool(),
            &UpsertCourse {
                lms_id: record.lms_id,
                name: record.name,
                npcu: record.npcu,
                is_active: record.is_active,
            },
        )
        .await?;
        Ok(())
    }
}
