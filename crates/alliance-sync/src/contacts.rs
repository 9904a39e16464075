//! Contact reconciliation.
//!
//! Mirrors the partner lifecycle, with two differences: contacts match by
//! external id then email, and the LMS user link on a contact row is never
//! touched by the upsert so it survives PRM churn.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use alliance_core::{SyncMode, SyncType};
use alliance_db::{Contact, NewContact, Partner, SyncRun, UpdateContact};
use alliance_prm::PrmContact;

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::SyncResult;
use crate::filter::{classify_contacts, FilteredContacts};
use crate::matcher::{ContactIndex, PartnerIndex};
use crate::partners::{REASON_FILTERED, REASON_REMOVED};
use crate::stats::SyncStats;

const CONTACT_FIELDS: &[&str] = &["id", "accountId", "email", "firstName", "lastName", "status"];

impl SyncEngine {
    /// Reconciles contacts against the PRM contact feed.
    #[instrument(skip(self))]
    pub async fn sync_contacts(&self, mode: SyncMode) -> SyncResult<SyncOutcome> {
        let (mode, since) = self.resolve_mode(mode, SyncType::Contacts).await?;
        let run = SyncRun::start(self.pool(), SyncType::Contacts, mode).await?;
        let mut stats = SyncStats::new();

        match self.sync_contacts_inner(mode, since, &mut stats).await {
            Ok(()) => self.finish_run(run.id, stats).await,
            Err(error) => {
                self.fail_run(run.id, &stats, &error).await;
                Err(error)
            }
        }
    }

    async fn sync_contacts_inner(
        &self,
        mode: SyncMode,
        since: Option<DateTime<Utc>>,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        self.prm().ensure_healthy()?;

        let fetch = self
            .prm()
            .fetch_all("contacts", CONTACT_FIELDS, None, since)
            .await?;
        let complete_fetch = fetch.is_complete();
        if let Some(error) = &fetch.partial_error {
            stats.api_errors += 1;
            stats.errors.push(format!("partial contact fetch: {error}"));
        }

        let mut contacts = Vec::with_capacity(fetch.records.len());
        for value in &fetch.records {
            match PrmContact::from_json(value) {
                Ok(contact) => contacts.push(contact),
                Err(error) => stats.record_error("contact mapping", &error),
            }
        }

        let filtered = classify_contacts(contacts, self.settings());
        for (_, reason) in &filtered.excluded {
            stats.record_exclusion(reason.as_str());
        }

        let partners = PartnerIndex::build(Partner::list_all(self.pool()).await?);
        let mut index = ContactIndex::build(Contact::list_all(self.pool()).await?);

        let total = filtered.valid.len();
        for (position, contact) in filtered.valid.iter().enumerate() {
            self.progress().report(
                "contacts:upsert",
                position + 1,
                total,
                Some(contact.email.clone()),
            );
            stats.processed += 1;
            if let Err(error) = self
                .upsert_contact(contact, &partners, &mut index, stats)
                .await
            {
                stats.record_error(&format!("contact {}", contact.email), &error);
            }
        }

        if mode == SyncMode::Full {
            if complete_fetch {
                self.deactivate_missing_contacts(&filtered, &mut index, stats)
                    .await?;
            } else {
                warn!("Skipping contact deactivation pass: contact fetch was partial");
            }
        }

        Ok(())
    }

    async fn upsert_contact(
        &self,
        contact: &PrmContact,
        partners: &PartnerIndex,
        index: &mut ContactIndex,
        stats: &mut SyncStats,
    ) -> Result<(), sqlx::Error> {
        let partner_id = contact
            .account_prm_id
            .as_deref()
            .and_then(|prm_id| partners.find_by_prm_id(prm_id))
            .map(|partner| partner.id);

        let update = UpdateContact {
            partner_id,
            email: contact.email.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            prm_id: Some(contact.prm_id.clone()),
        };

        match index.match_contact(contact).cloned() {
            Some(mut row) => {
                if !row.is_active {
                    row = Contact::reactivate(self.pool(), row.id).await?;
                    stats.reactivated += 1;
                    info!(contact = %row.email, "Contact reactivated");
                }
                if row.differs_from(&update) {
                    row = Contact::update(self.pool(), row.id, &update).await?;
                    stats.updated += 1;
                }
                index.register(row);
            }
            None => {
                let row = Contact::create(
                    self.pool(),
                    NewContact {
                        partner_id,
                        email: contact.email.clone(),
                        first_name: contact.first_name.clone(),
                        last_name: contact.last_name.clone(),
                        prm_id: Some(contact.prm_id.clone()),
                    },
                )
                .await?;
                stats.created += 1;
                index.register(row);
            }
        }

        Ok(())
    }

    /// Full-sync deactivation with the same link-then-delete two-step as
    /// partners; each soft delete triggers contact offboarding.
    async fn deactivate_missing_contacts(
        &self,
        filtered: &FilteredContacts,
        index: &mut ContactIndex,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        for (contact, _) in &filtered.excluded {
            let unlinked = index
                .match_contact(contact)
                .filter(|row| row.prm_id.is_none())
                .map(|row| row.id);
            if let Some(contact_id) = unlinked {
                match Contact::attach_prm_id(self.pool(), contact_id, &contact.prm_id).await {
                    Ok(row) => index.register(row),
                    Err(error) => {
                        stats.record_error(&format!("linking contact {}", contact.email), &error);
                    }
                }
            }
        }

        let valid_ids: HashSet<&str> = filtered
            .valid
            .iter()
            .map(|contact| contact.prm_id.as_str())
            .collect();
        let filtered_ids: HashSet<&str> = filtered
            .excluded
            .iter()
            .map(|(contact, _)| contact.prm_id.as_str())
            .collect();

        for contact in Contact::active_with_prm_id(self.pool()).await? {
            let Some(prm_id) = contact.prm_id.as_deref() else {
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

            match Contact::soft_delete(self.pool(), contact.id, reason).await {
                Ok(row) => {
                    stats.deactivated += 1;
                    info!(contact = %row.email, reason, "Contact deactivated");
                    if let Err(error) = self.offboard_contact(row.id).await {
                        stats
                            .errors
                            .push(format!("offboarding contact {}: {error}", row.email));
                    }
                }
                Err(error) => {
                    stats.record_error(&format!("deactivating contact {}", contact.email), &error);
                }
            }
        }

        Ok(())
    }
}
