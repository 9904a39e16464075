//! LMS user mirror sync.
//!
//! The remote never announces deletions; a full fetch is the only moment
//! absence is meaningful, so only full mode may infer `deleted`. Users that
//! map to a known contact by email get linked, once, and the link survives
//! later syncs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use alliance_core::{SyncMode, SyncType};
use alliance_db::{Contact, LmsUser, LmsUserStatus, SyncRun, UpsertLmsUser};
use alliance_lms::LmsUserRecord;

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::SyncResult;
use crate::filter::classify_lms_user;
use crate::matcher::ContactIndex;
use crate::session::SyncSession;
use crate::stats::SyncStats;

fn user_upsert(record: &LmsUserRecord) -> UpsertLmsUser {
    let status = if record.deactivated_at.is_some() || !record.is_active() {
        LmsUserStatus::Deactivated
    } else {
        LmsUserStatus::Active
    };

    UpsertLmsUser {
        lms_id: record.lms_id.clone(),
        email: record.email.clone(),
        name: record.name.clone(),
        status,
        last_active_at: record.last_active_at,
        deactivated_at: record.deactivated_at,
    }
}

impl SyncEngine {
    /// Mirrors LMS learner accounts into the local store.
    #[instrument(skip(self, session))]
    pub async fn sync_lms_users(
        &self,
        mode: SyncMode,
        session: &mut SyncSession,
    ) -> SyncResult<SyncOutcome> {
        let (mode, since) = self.resolve_mode(mode, SyncType::LmsUsers).await?;
        let run = SyncRun::start(self.pool(), SyncType::LmsUsers, mode).await?;
        let mut stats = SyncStats::new();

        match self
            .sync_lms_users_inner(mode, since, session, &mut stats)
            .await
        {
            Ok(()) => self.finish_run(run.id, stats).await,
            Err(error) => {
                self.fail_run(run.id, &stats, &error).await;
                Err(error)
            }
        }
    }

    async fn sync_lms_users_inner(
        &self,
        mode: SyncMode,
        since: Option<DateTime<Utc>>,
        session: &mut SyncSession,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        self.lms().ensure_healthy()?;

        let fetch = self.lms().fetch_collection("users", since).await?;
        let complete_fetch = fetch.is_complete();
        if let Some(error) = &fetch.partial_error {
            stats.api_errors += 1;
            stats.errors.push(format!("partial user fetch: {error}"));
        }

        let mut records = Vec::with_capacity(fetch.records.len());
        for value in &fetch.records {
            match LmsUserRecord::from_json(value) {
                Ok(record) => records.push(record),
                Err(error) => stats.record_error("user mapping", &error),
            }
        }

        let mut valid = Vec::new();
        let mut seen_ids: Vec<String> = Vec::with_capacity(records.len());
        for record in records {
            // Every fetched id still exists remotely, eligible or not; the
            // deletion pass below must not treat filtered users as vanished.
            seen_ids.push(record.lms_id.clone());
            match classify_lms_user(&record, self.settings()) {
                Ok(()) => valid.push(record),
                Err(reason) => stats.record_exclusion(reason.as_str()),
            }
        }

        let existing: HashMap<String, LmsUser> = LmsUser::list_all(self.pool())
            .await?
            .into_iter()
            .map(|user| (user.lms_id.clone(), user))
            .collect();
        let mut contacts = ContactIndex::build(Contact::list_all(self.pool()).await?);

        let total = valid.len();
        for (position, record) in valid.iter().enumerate() {
            self.progress().report(
                "lms_users:upsert",
                position + 1,
                total,
                Some(record.email.clone()),
            );
            stats.processed += 1;

            let data = user_upsert(record);
            let write = match existing.get(&record.lms_id) {
                Some(row) => {
                    if row.differs_from(&data) {
                        stats.updated += 1;
                        true
                    } else {
                        false
                    }
                }
                None => {
                    stats.created += 1;
                    true
                }
            };

            if write {
                if let Err(error) = LmsUser::upsert(self.pool(), &data).await {
                    stats.record_error(&format!("lms user {}", record.email), &error);
                    continue;
                }
            }

            self.link_contact(record, &mut contacts, stats).await;
        }

        if mode == SyncMode::Full {
            if complete_fetch {
                let deleted = LmsUser::mark_deleted_except(self.pool(), &seen_ids).await?;
                if deleted > 0 {
                    debug!(deleted, "Marked absent LMS users as deleted");
                    stats.deactivated += u32::try_from(deleted).unwrap_or(u32::MAX);
                }
            } else {
                warn!("Skipping LMS user deletion pass: user fetch was partial");
            }
        }

        if complete_fetch {
            session.set_users(valid);
        }

        Ok(())
    }

    /// Links a mirrored user to the contact with the same email, once.
    async fn link_contact(
        &self,
        record: &LmsUserRecord,
        contacts: &mut ContactIndex,
        stats: &mut SyncStats,
    ) {
        let unlinked = contacts
            .find_by_email(&record.email)
            .filter(|contact| contact.lms_user_id.is_none())
            .map(|contact| contact.id);

        if let Some(contact_id) = unlinked {
            match Contact::set_lms_user(self.pool(), contact_id, &record.lms_id).await {
                Ok(row) => {
                    debug!(contact = %row.email, lms_id = %record.lms_id, "Linked contact to LMS user");
                    contacts.register(row);
                }
                Err(error) => {
                    stats.record_error(&format!("linking contact {}", record.email), &error);
                }
            }
        }
    }
}
