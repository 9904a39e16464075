//! LMS group and membership sync.
//!
//! Groups always sync as a full pass; the expensive part is membership,
//! which is why each group's remote member count is compared against the
//! locally cached count first. Only groups whose counts differ refetch
//! their member list, which cuts the per-group API calls dramatically on a
//! quiet day.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument, warn};

use alliance_core::{SyncMode, SyncType};
use alliance_db::{GroupMembership, LmsGroup, LmsUser, Partner, SyncRun, UpsertLmsGroup};
use alliance_lms::LmsGroupRecord;

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::SyncResult;
use crate::session::SyncSession;
use crate::stats::SyncStats;

/// Soft-delete reason for groups the LMS no longer knows.
pub const REASON_NOT_FOUND_IN_LMS: &str = "not found in LMS";

impl SyncEngine {
    /// Mirrors LMS groups, links them to partners, and refreshes changed
    /// memberships.
    #[instrument(skip(self, session))]
    pub async fn sync_lms_groups(&self, session: &mut SyncSession) -> SyncResult<SyncOutcome> {
        let run = SyncRun::start(self.pool(), SyncType::LmsGroups, SyncMode::Full).await?;
        let mut stats = SyncStats::new();

        match self.sync_lms_groups_inner(session, &mut stats).await {
            Ok(()) => self.finish_run(run.id, stats).await,
            Err(error) => {
                self.fail_run(run.id, &stats, &error).await;
                Err(error)
            }
        }
    }

    async fn sync_lms_groups_inner(
        &self,
        session: &mut SyncSession,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        self.lms().ensure_healthy()?;

        let records = self.load_group_records(session, stats).await?;

        let partners_by_name: HashMap<String, Partner> = Partner::list_all(self.pool())
            .await?
            .into_iter()
            .filter(|partner| partner.is_active)
            .map(|partner| (partner.name.trim().to_lowercase(), partner))
            .collect();

        let existing: HashMap<String, LmsGroup> = LmsGroup::list_all(self.pool())
            .await?
            .into_iter()
            .map(|group| (group.lms_id.clone(), group))
            .collect();

        let all_partners_name = self.settings().all_partners_group.to_lowercase();

        let total = records.len();
        for (position, record) in records.iter().enumerate() {
            self.progress().report(
                "lms_groups:upsert",
                position + 1,
                total,
                Some(record.name.clone()),
            );
            stats.processed += 1;

            let prior = existing.get(&record.lms_id);
            let changed = match prior {
                Some(group) => group.name != record.name || !group.is_active,
                None => true,
            };

            if changed {
                match LmsGroup::upsert(
                    self.pool(),
                    &UpsertLmsGroup {
                        lms_id: record.lms_id.clone(),
                        name: record.name.clone(),
                    },
                )
                .await
                {
                    Ok(_) => {
                        if prior.is_some() {
                            stats.updated += 1;
                        } else {
                            stats.created += 1;
                        }
                    }
                    Err(error) => {
                        stats.record_error(&format!("group {}", record.name), &error);
                        continue;
                    }
                }
            }

            let name_key = record.name.trim().to_lowercase();
            if name_key == all_partners_name {
                // The distinguished all-partners group sits outside the
                // partner naming convention and is always retained.
                continue;
            }

            if let Some(partner) = partners_by_name.get(&name_key) {
                let already_linked =
                    prior.is_some_and(|group| group.partner_id == Some(partner.id));
                if !already_linked {
                    if let Err(error) =
                        LmsGroup::link_partner(self.pool(), &record.lms_id, partner.id).await
                    {
                        stats.record_error(&format!("linking group {}", record.name), &error);
                        continue;
                    }
                }
                session.set_partner_group(partner.id, record.lms_id.clone());
            }
        }

        self.refresh_memberships(&records, stats).await?;

        Ok(())
    }

    /// Group records from the session cache, or a fresh fetch.
    async fn load_group_records(
        &self,
        session: &mut SyncSession,
        stats: &mut SyncStats,
    ) -> SyncResult<Vec<LmsGroupRecord>> {
        if let Some(cached) = session.groups() {
            debug!(count = cached.len(), "Using cached LMS groups");
            return Ok(cached.to_vec());
        }

        let fetch = self.lms().fetch_collection("groups", None).await?;
        let complete_fetch = fetch.is_complete();
        if let Some(error) = &fetch.partial_error {
            stats.api_errors += 1;
            stats.errors.push(format!("partial group fetch: {error}"));
        }

        let mut records = Vec::with_capacity(fetch.records.len());
        for value in &fetch.records {
            match LmsGroupRecord::from_json(value) {
                Ok(record) => records.push(record),
                Err(error) => stats.record_error("group mapping", &error),
            }
        }

        if complete_fetch {
            session.set_groups(records.clone());
        }
        Ok(records)
    }

    /// Refreshes membership for groups whose remote member count moved.
    async fn refresh_memberships(
        &self,
        records: &[LmsGroupRecord],
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        let remote_counts: HashMap<&str, i64> = records
            .iter()
            .filter_map(|record| {
                record
                    .member_count
                    .map(|count| (record.lms_id.as_str(), count))
            })
            .collect();

        let known_users: HashSet<String> =
            LmsUser::list_ids(self.pool()).await?.into_iter().collect();

        for group in LmsGroup::list_active(self.pool()).await? {
            let remote_count = match remote_counts.get(group.lms_id.as_str()) {
                Some(count) => *count,
                // One extra call per group the list endpoint didn't cover.
                None => match self.fetch_member_count(&group.lms_id).await {
                    Ok(Some(count)) => count,
                    Ok(None) => {
                        match LmsGroup::soft_delete(
                            self.pool(),
                            &group.lms_id,
                            REASON_NOT_FOUND_IN_LMS,
                        )
                        .await
                        {
                            Ok(row) => {
                                stats.deactivated += 1;
                                info!(group = %row.name, "Group deactivated: gone from LMS");
                            }
                            Err(error) => {
                                stats.record_error(
                                    &format!("deactivating group {}", group.name),
                                    &error,
                                );
                            }
                        }
                        continue;
                    }
                    Err(error) => {
                        stats.api_errors += 1;
                        stats
                            .errors
                            .push(format!("member count for group {}: {error}", group.name));
                        continue;
                    }
                },
            };

            if remote_count == i64::from(group.member_count) {
                // Unchanged; just record that we looked.
                if let Err(error) =
                    LmsGroup::set_member_count(self.pool(), &group.lms_id, group.member_count)
                        .await
                {
                    stats.record_error(&format!("touching group {}", group.name), &error);
                }
                continue;
            }

            if let Err(error) = self
                .refresh_group_members(&group.lms_id, &group.name, &known_users, stats)
                .await
            {
                stats.api_errors += 1;
                stats
                    .errors
                    .push(format!("membership for group {}: {error}", group.name));
            }
        }

        Ok(())
    }

    async fn fetch_member_count(&self, group_id: &str) -> SyncResult<Option<i64>> {
        match self.lms().get_one(&format!("groups/{group_id}")).await {
            Ok(value) => {
                let record = LmsGroupRecord::from_json(&value)?;
                Ok(Some(record.member_count.unwrap_or(0)))
            }
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn refresh_group_members(
        &self,
        group_id: &str,
        group_name: &str,
        known_users: &HashSet<String>,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        let fetch = match self
            .lms()
            .fetch_collection(&format!("groups/{group_id}/people"), None)
            .await
        {
            Ok(fetch) => fetch,
            Err(error) if error.is_not_found() => {
                let row =
                    LmsGroup::soft_delete(self.pool(), group_id, REASON_NOT_FOUND_IN_LMS).await?;
                stats.deactivated += 1;
                info!(group = %row.name, "Group deactivated: gone from LMS");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        if !fetch.is_complete() {
            // Replacing membership from a partial list would drop members
            // the broken fetch never reached.
            warn!(group = group_name, "Skipping membership replace: member fetch was partial");
            return Ok(());
        }

        let mut member_ids: Vec<String> = Vec::with_capacity(fetch.records.len());
        let mut unknown = 0usize;
        for value in &fetch.records {
            let id = match value.get("id") {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            match id {
                Some(id) if known_users.contains(&id) => member_ids.push(id),
                _ => unknown += 1,
            }
        }
        if unknown > 0 {
            debug!(group = group_name, unknown, "Skipped members without a mirrored user row");
        }

        let delta = GroupMembership::replace_members(self.pool(), group_id, &member_ids).await?;
        let count = i32::try_from(member_ids.len()).unwrap_or(i32::MAX);
        LmsGroup::set_member_count(self.pool(), group_id, count).await?;

        stats.updated += 1;
        debug!(
            group = group_name,
            added = delta.added,
            removed = delta.removed,
            "Group membership refreshed"
        );
        Ok(())
    }
}
