//! Offboarding: compensating LMS removals when an entity goes inactive.
//!
//! Offboarding is best effort by design. Removal calls are retried by the
//! client's transport layer but are not transactionally guaranteed; a
//! failed removal is reported, not replayed. A 404 anywhere means the
//! remote side is already clean.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use alliance_db::{Contact, GroupMembership, LmsGroup, Partner};

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

/// Local soft-delete reason for a partner group removed by offboarding.
pub const REASON_PARTNER_OFFBOARDED: &str = "partner offboarded";

/// Aggregate result of a batch offboarding call.
///
/// Entities are processed independently; one failure never blocks the
/// remainder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OffboardOutcome {
    /// Entities fully offboarded.
    pub succeeded: u32,
    /// Entities whose offboarding failed.
    pub failed: u32,
    /// One description per failure.
    pub errors: Vec<String>,
}

impl SyncEngine {
    /// Removes a contact's linked LMS user from the contact's partner group
    /// and from the all-partners group. A contact with no linked LMS user
    /// is a no-op.
    #[instrument(skip(self))]
    pub async fn offboard_contact(&self, contact_id: Uuid) -> SyncResult<()> {
        let contact = Contact::find_by_id(self.pool(), contact_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("contact {contact_id}")))?;

        let Some(lms_user_id) = contact.lms_user_id.as_deref() else {
            debug!(contact = %contact.email, "No linked LMS user, nothing to offboard");
            return Ok(());
        };

        let person = vec![lms_user_id.to_string()];

        if let Some(partner_id) = contact.partner_id {
            if let Some(group) = LmsGroup::find_by_partner(self.pool(), partner_id).await? {
                self.lms()
                    .remove_group_members(&group.lms_id, &person)
                    .await?;
                debug!(contact = %contact.email, group = %group.name, "Removed from partner group");
            }
        }

        if let Some(all_partners) =
            LmsGroup::find_by_name(self.pool(), &self.settings().all_partners_group).await?
        {
            self.lms()
                .remove_group_members(&all_partners.lms_id, &person)
                .await?;
        }

        info!(contact = %contact.email, "Contact offboarded");
        Ok(())
    }

    /// Removes every LMS user associated with a partner (via contact link
    /// or group membership) from the all-partners group, then deletes the
    /// partner's dedicated group. A 404 on the group deletion means it is
    /// already gone.
    #[instrument(skip(self))]
    pub async fn offboard_partner(&self, partner_id: Uuid) -> SyncResult<()> {
        let partner = Partner::find_by_id(self.pool(), partner_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("partner {partner_id}")))?;

        let group = LmsGroup::find_by_partner(self.pool(), partner_id).await?;

        let mut user_ids: HashSet<String> = Contact::linked_for_partner(self.pool(), partner_id)
            .await?
            .into_iter()
            .filter_map(|contact| contact.lms_user_id)
            .collect();
        if let Some(group) = &group {
            user_ids.extend(GroupMembership::user_ids_of(self.pool(), &group.lms_id).await?);
        }

        if !user_ids.is_empty() {
            if let Some(all_partners) =
                LmsGroup::find_by_name(self.pool(), &self.settings().all_partners_group).await?
            {
                let mut ids: Vec<String> = user_ids.into_iter().collect();
                ids.sort();
                self.lms()
                    .remove_group_members(&all_partners.lms_id, &ids)
                    .await?;
                debug!(partner = %partner.name, removed = ids.len(), "Removed users from all-partners group");
            }
        }

        if let Some(group) = group {
            self.lms().delete_group(&group.lms_id).await?;
            LmsGroup::soft_delete(self.pool(), &group.lms_id, REASON_PARTNER_OFFBOARDED).await?;
            debug!(partner = %partner.name, group = %group.name, "Partner group deleted");
        }

        info!(partner = %partner.name, "Partner offboarded");
        Ok(())
    }

    /// Offboards a batch of contacts, one at a time, each independently.
    pub async fn offboard_contacts(&self, contact_ids: &[Uuid]) -> OffboardOutcome {
        let mut outcome = OffboardOutcome::default();
        for &contact_id in contact_ids {
            match self.offboard_contact(contact_id).await {
                Ok(()) => outcome.succeeded += 1,
                Err(error) => {
                    outcome.failed += 1;
                    outcome
                        .errors
                        .push(format!("contact {contact_id}: {error}"));
                }
            }
        }
        outcome
    }

    /// Offboards a batch of partners, one at a time, each independently.
    pub async fn offboard_partners(&self, partner_ids: &[Uuid]) -> OffboardOutcome {
        let mut outcome = OffboardOutcome::default();
        for &partner_id in partner_ids {
            match self.offboard_partner(partner_id).await {
                Ok(()) => outcome.succeeded += 1,
                Err(error) => {
                    outcome.failed += 1;
                    outcome
                        .errors
                        .push(format!("partner {partner_id}: {error}"));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_default_is_empty() {
        let outcome = OffboardOutcome::default();
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.errors.is_empty());
    }
}
