//! Mirrored LMS cohort groups.
//!
//! A group is bound to at most one partner via the naming convention. The
//! cached `member_count` is the short-circuit for membership refreshes:
//! only groups whose remote count differs from the cached one refetch their
//! member list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A cohort group mirrored from the LMS.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LmsGroup {
    /// External LMS id; primary key.
    pub lms_id: String,

    /// Group display name.
    pub name: String,

    /// Partner this group belongs to, when it follows the naming convention.
    pub partner_id: Option<Uuid>,

    /// Member count as of the last refresh.
    pub member_count: i32,

    /// Cleared when the group is soft-deleted.
    pub is_active: bool,

    /// Why the group was soft-deleted.
    pub deactivation_reason: Option<String>,

    /// When the member count was last compared against the remote.
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload mapped from a fetched LMS group.
#[derive(Debug, Clone)]
pub struct UpsertLmsGroup {
    pub lms_id: String,
    pub name: String,
}

impl LmsGroup {
    /// Insert or refresh a group. Reactivates a soft-deleted group that
    /// reappeared; leaves the cached member count alone so the refresh
    /// comparison still sees the pre-sync value.
    pub async fn upsert(pool: &PgPool, data: &UpsertLmsGroup) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO lms_groups (lms_id, name)
            VALUES ($1, $2)
            ON CONFLICT (lms_id) DO UPDATE
            SET name = EXCLUDED.name, is_active = TRUE,
                deactivation_reason = NULL, updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&data.lms_id)
        .bind(&data.name)
        .fetch_one(pool)
        .await
    }

    /// Bind a group to its partner.
    pub async fn link_partner(
        pool: &PgPool,
        lms_id: &str,
        partner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE lms_groups
            SET partner_id = $2, updated_at = NOW()
            WHERE lms_id = $1
            RETURNING *
            ",
        )
        .bind(lms_id)
        .bind(partner_id)
        .fetch_one(pool)
        .await
    }

    /// Record a fresh member count after a membership refresh or check.
    pub async fn set_member_count(
        pool: &PgPool,
        lms_id: &str,
        member_count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE lms_groups
            SET member_count = $2, last_checked_at = NOW(), updated_at = NOW()
            WHERE lms_id = $1
            ",
        )
        .bind(lms_id)
        .bind(member_count)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Soft-delete: clear the active flag and record why.
    pub async fn soft_delete(
        pool: &PgPool,
        lms_id: &str,
        reason: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE lms_groups
            SET is_active = FALSE, deactivation_reason = $2, updated_at = NOW()
            WHERE lms_id = $1
            RETURNING *
            ",
        )
        .bind(lms_id)
        .bind(reason)
        .fetch_one(pool)
        .await
    }

    /// Find a group by external id.
    pub async fn find(pool: &PgPool, lms_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_groups WHERE lms_id = $1")
            .bind(lms_id)
            .fetch_optional(pool)
            .await
    }

    /// The partner's dedicated group, if one exists.
    pub async fn find_by_partner(
        pool: &PgPool,
        partner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_groups WHERE partner_id = $1 AND is_active")
            .bind(partner_id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive name lookup, for the distinguished group.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_groups WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// All active groups.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_groups WHERE is_active ORDER BY lms_id")
            .fetch_all(pool)
            .await
    }

    /// Every mirrored group, active or not.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_groups ORDER BY lms_id")
            .fetch_all(pool)
            .await
    }
}
