//! Partner reconciliation.
//!
//! Full mode walks the entire remote account collection and is the only
//! mode allowed to deactivate: absence from an incremental fetch means
//! "unchanged", not "gone". The deactivation pass distinguishes accounts
//! that are still present remotely but ineligible from accounts that
//! vanished, tagging each soft delete accordingly.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use alliance_core::{SyncMode, SyncType};
use alliance_db::{NewPartner, Partner, SyncRun, UpdatePartner};
use alliance_prm::PrmAccount;

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::SyncResult;
use crate::filter::{classify_accounts, FilteredAccounts};
use crate::matcher::PartnerIndex;
use crate::stats::SyncStats;

/// Soft-delete reason for rows whose remote record still exists but failed
/// eligibility.
pub const REASON_FILTERED: &str = "filtered (ineligible)";
/// Soft-delete reason for rows whose remote record vanished from the feed.
pub const REASON_REMOVED: &str = "removed upstream";

const ACCOUNT_FIELDS: &[&str] = &[
    "id",
    "name",
    "tier",
    "status",
    "region",
    "ownerName",
    "ownerEmail",
    "parentAccountId",
    "crmAccountId",
];

fn account_update(account: &PrmAccount) -> UpdatePartner {
    UpdatePartner {
        name: account.name.clone(),
        tier: account.tier.clone().unwrap_or_default(),
        status: account.status.clone().unwrap_or_default(),
        region: account.region.clone(),
        owner_name: account.owner_name.clone(),
        owner_email: account.owner_email.clone(),
        prm_id: Some(account.prm_id.clone()),
        prm_parent_id: account.parent_prm_id.clone(),
        crm_ref: account.crm_ref.clone(),
    }
}

fn account_insert(account: &PrmAccount) -> NewPartner {
    NewPartner {
        name: account.name.clone(),
        tier: account.tier.clone().unwrap_or_default(),
        status: account.status.clone().unwrap_or_default(),
        region: account.region.clone(),
        owner_name: account.owner_name.clone(),
        owner_email: account.owner_email.clone(),
        prm_id: Some(account.prm_id.clone()),
        prm_parent_id: account.parent_prm_id.clone(),
        crm_ref: account.crm_ref.clone(),
    }
}

impl SyncEngine {
    /// Reconciles partner companies against the PRM account feed.
    #[instrument(skip(self))]
    pub async fn sync_partners(&self, mode: SyncMode) -> SyncResult<SyncOutcome> {
        let (mode, since) = self.resolve_mode(mode, SyncType::Partners).await?;
        let run = SyncRun::start(self.pool(), SyncType::Partners, mode).await?;
        let mut stats = SyncStats::new();

        match self.sync_partners_inner(mode, since, &mut stats).await {
            Ok(()) => self.finish_run(run.id, stats).await,
            Err(error) => {
                self.fail_run(run.id, &stats, &error).await;
                Err(error)
            }
        }
    }

    async fn sync_partners_inner(
        &self,
        mode: SyncMode,
        since: Option<DateTime<Utc>>,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        self.prm().ensure_healthy()?;

        let fetch = self
            .prm()
            .fetch_all("accounts", ACCOUNT_FIELDS, None, since)
            .await?;
        let complete_fetch = fetch.is_complete();
        if let Some(error) = &fetch.partial_error {
            stats.api_errors += 1;
            stats.errors.push(format!("partial account fetch: {error}"));
        }

        let mut accounts = Vec::with_capacity(fetch.records.len());
        for value in &fetch.records {
            match PrmAccount::from_json(value) {
                Ok(account) => accounts.push(account),
                Err(error) => stats.record_error("account mapping", &error),
            }
        }

        let filtered = classify_accounts(accounts, self.settings());
        for (_, reason) in &filtered.excluded {
            stats.record_exclusion(reason.as_str());
        }

        let mut index = PartnerIndex::build(Partner::list_all(self.pool()).await?);

        let total = filtered.valid.len();
        for (position, account) in filtered.valid.iter().enumerate() {
            self.progress().report(
                "partners:upsert",
                position + 1,
                total,
                Some(account.name.clone()),
            );
            stats.processed += 1;
            if let Err(error) = self.upsert_partner(account, &mut index, stats).await {
                stats.record_error(&format!("partner {}", account.name), &error);
            }
        }

        if mode == SyncMode::Full {
            if complete_fetch {
                self.deactivate_missing_partners(&filtered, &mut index, stats)
                    .await?;
            } else {
                // Deactivating against a partial snapshot would soft-delete
                // every account the broken fetch never reached.
                warn!("Skipping partner deactivation pass: account fetch was partial");
            }
        }

        Ok(())
    }

    async fn upsert_partner(
        &self,
        account: &PrmAccount,
        index: &mut PartnerIndex,
        stats: &mut SyncStats,
    ) -> Result<(), sqlx::Error> {
        let update = account_update(account);

        match index.match_account(account).cloned() {
            Some(mut row) => {
                if !row.is_active {
                    row = Partner::reactivate(self.pool(), row.id).await?;
                    stats.reactivated += 1;
                    info!(partner = %row.name, "Partner reactivated");
                }
                if row.differs_from(&update) {
                    row = Partner::update(self.pool(), row.id, &update).await?;
                    stats.updated += 1;
                }
                index.register(row);
            }
            None => {
                let row = Partner::create(self.pool(), account_insert(account)).await?;
                stats.created += 1;
                index.register(row);
            }
        }

        Ok(())
    }

    /// Full-sync deactivation: link-then-delete.
    ///
    /// Rows that exist locally without an external id (imported through
    /// another channel) are first linked to their filtered remote record so
    /// the pass below can see them; then every active row with an external
    /// id that is not in the valid set is soft-deleted with the reason its
    /// absence deserves.
    async fn deactivate_missing_partners(
        &self,
        filtered: &FilteredAccounts,
        index: &mut PartnerIndex,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        for (account, _) in &filtered.excluded {
            let unlinked = index
                .match_account(account)
                .filter(|partner| partner.prm_id.is_none())
                .map(|partner| partner.id);
            if let Some(partner_id) = unlinked {
                match Partner::attach_prm_id(self.pool(), partner_id, &account.prm_id).await {
                    Ok(row) => index.register(row),
                    Err(error) => {
                        stats.record_error(&format!("linking partner {}", account.name), &error);
                    }
                }
            }
        }

        let valid_ids: HashSet<&str> = filtered
            .valid
            .iter()
            .map(|account| account.prm_id.as_str())
            .collect();
        let filtered_ids: HashSet<&str> = filtered
            .excluded
            .iter()
            .map(|(account, _)| account.prm_id.as_str())
            .collect();

        for partner in Partner::active_with_prm_id(self.pool()).await? {
            let Some(prm_id) = partner.prm_id.as_deref() else {
                continue;
            };
            if valid_ids.contains(prm_id) {
                continue;
            }

            let reason = if filtered_ids.contains(prm_id) {
                REASON_FILTERED
            } else {
                REASON_REMOVED
            };

            match Partner::soft_delete(self.pool(), partner.id, reason).await {
                Ok(row) => {
                    stats.deactivated += 1;
                    info!(partner = %row.name, reason, "Partner deactivated");
                    if let Err(error) = self.offboard_partner(row.id).await {
                        stats
                            .errors
                            .push(format!("offboarding partner {}: {error}", row.name));
                    }
                }
                Err(error) => {
                    stats.record_error(&format!("deactivating partner {}", partner.name), &error);
                }
            }
        }

        Ok(())
    }
}
