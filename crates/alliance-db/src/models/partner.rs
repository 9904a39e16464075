//! Partner company model.
//!
//! Mirrors the PRM account record. Rows are soft-deleted, never removed, so
//! a partner that disappears upstream keeps its history and can reactivate
//! under the same local id if its PRM id reappears.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A partner company record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Partner {
    /// Local identifier.
    pub id: Uuid,

    /// Company name as reported by the PRM.
    pub name: String,

    /// Program tier display string (validated upstream of the store).
    pub tier: String,

    /// PRM account status string.
    pub status: String,

    /// Sales region.
    pub region: Option<String>,

    /// Account owner's name.
    pub owner_name: Option<String>,

    /// Account owner's email.
    pub owner_email: Option<String>,

    /// External PRM account id; unique among active rows.
    pub prm_id: Option<String>,

    /// PRM id of the parent account, for aggregator hierarchies.
    pub prm_parent_id: Option<String>,

    /// Cross-reference id shared with the CRM; 15- or 18-character form.
    pub crm_ref: Option<String>,

    /// Cleared when the partner is soft-deleted.
    pub is_active: bool,

    /// When the partner was soft-deleted.
    pub deactivated_at: Option<DateTime<Utc>>,

    /// Why the partner was soft-deleted.
    pub deactivation_reason: Option<String>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting a partner on first sighting.
#[derive(Debug, Clone)]
pub struct NewPartner {
    pub name: String,
    pub tier: String,
    pub status: String,
    pub region: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub prm_id: Option<String>,
    pub prm_parent_id: Option<String>,
    pub crm_ref: Option<String>,
}

/// Mutable fields applied on every sync where the remote record still
/// resolves to the row.
#[derive(Debug, Clone)]
pub struct UpdatePartner {
    pub name: String,
    pub tier: String,
    pub status: String,
    pub region: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub prm_id: Option<String>,
    pub prm_parent_id: Option<String>,
    pub crm_ref: Option<String>,
}

impl Partner {
    /// Insert a new active partner.
    pub async fn create(pool: &PgPool, data: NewPartner) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO partners
                (name, tier, status, region, owner_name, owner_email,
                 prm_id, prm_parent_id, crm_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            ",
        )
        .bind(&data.name)
        .bind(&data.tier)
        .bind(&data.status)
        .bind(&data.region)
        .bind(&data.owner_name)
        .bind(&data.owner_email)
        .bind(&data.prm_id)
        .bind(&data.prm_parent_id)
        .bind(&data.crm_ref)
        .fetch_one(pool)
        .await
    }

    /// Apply remote-authoritative field values.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &UpdatePartner,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE partners
            SET name = $2, tier = $3, status = $4, region = $5,
                owner_name = $6, owner_email = $7, prm_id = $8,
                prm_parent_id = $9, crm_ref = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.tier)
        .bind(&data.status)
        .bind(&data.region)
        .bind(&data.owner_name)
        .bind(&data.owner_email)
        .bind(&data.prm_id)
        .bind(&data.prm_parent_id)
        .bind(&data.crm_ref)
        .fetch_one(pool)
        .await
    }

    /// Attach an external PRM id to a row that was created through another
    /// channel and has never been matched against the feed before.
    pub async fn attach_prm_id(
        pool: &PgPool,
        id: Uuid,
        prm_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE partners
            SET prm_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(prm_id)
        .fetch_one(pool)
        .await
    }

    /// Soft-delete: clear the active flag and record when and why.
    pub async fn soft_delete(
        pool: &PgPool,
        id: Uuid,
        reason: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE partners
            SET is_active = FALSE, deactivated_at = NOW(),
                deactivation_reason = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(reason)
        .fetch_one(pool)
        .await
    }

    /// Reactivate a soft-deleted row whose PRM id reappeared in the valid
    /// set. Clears the soft-delete timestamp and reason.
    pub async fn reactivate(pool: &PgPool, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE partners
            SET is_active = TRUE, deactivated_at = NULL,
                deactivation_reason = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Find a partner by local id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM partners WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every row, active or not. Feeds the identity matcher's index.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM partners ORDER BY created_at")
            .fetch_all(pool)
            .await
    }

    /// Active rows carrying an external id: the population the full-sync
    /// deactivation pass examines.
    pub async fn active_with_prm_id(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM partners WHERE is_active AND prm_id IS NOT NULL ORDER BY created_at",
        )
        .fetch_all(pool)
        .await
    }

    /// Whether applying `data` would change any stored field. Idempotent
    /// runs use this to skip writes when nothing moved.
    #[must_use]
    pub fn differs_from(&self, data: &UpdatePartner) -> bool {
        self.name != data.name
            || self.tier != data.tier
            || self.status != data.status
            || self.region != data.region
            || self.owner_name != data.owner_name
            || self.owner_email != data.owner_email
            || self.prm_id != data.prm_id
            || self.prm_parent_id != data.prm_parent_id
            || self.crm_ref != data.crm_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Partner {
        Partner {
            id: Uuid::new_v4(),
            name: "Acme Networks".to_string(),
            tier: "Premier".to_string(),
            status: "Active".to_string(),
            region: Some("EMEA".to_string()),
            owner_name: None,
            owner_email: None,
            prm_id: Some("10042".to_string()),
            prm_parent_id: None,
            crm_ref: Some("001A0000012ab3Q".to_string()),
            is_active: true,
            deactivated_at: None,
            deactivation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn update_of(partner: &Partner) -> UpdatePartner {
        UpdatePartner {
            name: partner.name.clone(),
            tier: partner.tier.clone(),
            status: partner.status.clone(),
            region: partner.region.clone(),
            owner_name: partner.owner_name.clone(),
            owner_email: partner.owner_email.clone(),
            prm_id: partner.prm_id.clone(),
            prm_parent_id: partner.prm_parent_id.clone(),
            crm_ref: partner.crm_ref.clone(),
        }
    }

    #[test]
    fn test_identical_update_does_not_differ() {
        let partner = sample();
        assert!(!partner.differs_from(&update_of(&partner)));
    }

    #[test]
    fn test_changed_tier_differs() {
        let partner = sample();
        let mut update = update_of(&partner);
        update.tier = "Certified".to_string();
        assert!(partner.differs_from(&update));
    }

    #[test]
    fn test_newly_attached_crm_ref_differs() {
        let mut partner = sample();
        partner.crm_ref = None;
        let update = update_of(&sample());
        assert!(partner.differs_from(&update));
    }
}
