//! Partner contact model.
//!
//! A contact belongs to at most one partner and may be linked to an LMS
//! user. The LMS link is set once and survives every subsequent PRM resync;
//! regular updates deliberately do not touch it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A person record from the PRM.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    /// Local identifier.
    pub id: Uuid,

    /// Owning partner, when the PRM links one.
    pub partner_id: Option<Uuid>,

    /// Unique match key, compared case-insensitively.
    pub email: String,

    /// Given name.
    pub first_name: Option<String>,

    /// Family name.
    pub last_name: Option<String>,

    /// External PRM contact id.
    pub prm_id: Option<String>,

    /// Linked LMS user; preserved across re-syncs.
    pub lms_user_id: Option<String>,

    /// Cleared when the contact is soft-deleted.
    pub is_active: bool,

    /// When the contact was soft-deleted.
    pub deactivated_at: Option<DateTime<Utc>>,

    /// Why the contact was soft-deleted.
    pub deactivation_reason: Option<String>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting a contact on first sighting.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub partner_id: Option<Uuid>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub prm_id: Option<String>,
}

/// Mutable fields applied on resync. Excludes `lms_user_id` so the LMS link
/// survives PRM churn.
#[derive(Debug, Clone)]
pub struct UpdateContact {
    pub partner_id: Option<Uuid>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub prm_id: Option<String>,
}

impl Contact {
    /// Insert a new active contact.
    pub async fn create(pool: &PgPool, data: NewContact) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO contacts (partner_id, email, first_name, last_name, prm_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(data.partner_id)
        .bind(&data.email)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.prm_id)
        .fetch_one(pool)
        .await
    }

    /// Apply remote-authoritative field values, leaving the LMS link alone.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &UpdateContact,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE contacts
            SET partner_id = $2, email = $3, first_name = $4, last_name = $5,
                prm_id = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(data.partner_id)
        .bind(&data.email)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.prm_id)
        .fetch_one(pool)
        .await
    }

    /// Attach an external PRM id without touching other fields.
    pub async fn attach_prm_id(
        pool: &PgPool,
        id: Uuid,
        prm_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE contacts
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

    /// Link the contact to an LMS user. Set once; later syncs preserve it.
    pub async fn set_lms_user(
        pool: &PgPool,
        id: Uuid,
        lms_user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE contacts
            SET lms_user_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(lms_user_id)
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
            UPDATE contacts
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

    /// Reactivate a soft-deleted row whose PRM id reappeared.
    pub async fn reactivate(pool: &PgPool, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE contacts
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

    /// Find a contact by local id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive email lookup.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM contacts WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Every row, active or not. Feeds the identity matcher's index.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM contacts ORDER BY created_at")
            .fetch_all(pool)
            .await
    }

    /// Active rows carrying an external id, for the deactivation pass.
    pub async fn active_with_prm_id(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM contacts WHERE is_active AND prm_id IS NOT NULL ORDER BY created_at",
        )
        .fetch_all(pool)
        .await
    }

    /// Active contacts of a partner that are linked to an LMS user.
    pub async fn linked_for_partner(
        pool: &PgPool,
        partner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM contacts
            WHERE partner_id = $1 AND lms_user_id IS NOT NULL
            ORDER BY created_at
            ",
        )
        .bind(partner_id)
        .fetch_all(pool)
        .await
    }

    /// Whether applying `data` would change any stored field.
    #[must_use]
    pub fn differs_from(&self, data: &UpdateContact) -> bool {
        self.partner_id != data.partner_id
            || !self.email.eq_ignore_ascii_case(&data.email)
            || self.first_name != data.first_name
            || self.last_name != data.last_name
            || self.prm_id != data.prm_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Contact {
        Contact {
            id: Uuid::new_v4(),
            partner_id: Some(Uuid::new_v4()),
            email: "jane@acme.example".to_string(),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            prm_id: Some("20099".to_string()),
            lms_user_id: Some("lms-7".to_string()),
            is_active: true,
            deactivated_at: None,
            deactivation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_email_comparison_is_case_insensitive() {
        let contact = sample();
        let update = UpdateContact {
            partner_id: contact.partner_id,
            email: "JANE@ACME.EXAMPLE".to_string(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            prm_id: contact.prm_id.clone(),
        };
        assert!(!contact.differs_from(&update));
    }

    #[test]
    fn test_partner_move_differs() {
        let contact = sample();
        let update = UpdateContact {
            partner_id: Some(Uuid::new_v4()),
            email: contact.email.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            prm_id: contact.prm_id.clone(),
        };
        assert!(contact.differs_from(&update));
    }
}
