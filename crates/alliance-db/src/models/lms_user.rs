//! Mirrored LMS learner accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Lifecycle state of a mirrored LMS user.
///
/// `Deleted` is inferred, never sent by the remote feed: a locally-known id
/// absent from a full fetch is marked deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmsUserStatus {
    Active,
    Deactivated,
    Deleted,
}

impl LmsUserStatus {
    /// Stable identifier stored in the `status` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deactivated => "deactivated",
            Self::Deleted => "deleted",
        }
    }

    /// Parses a stored status string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "deactivated" => Some(Self::Deactivated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for LmsUserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A learner account mirrored from the LMS.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LmsUser {
    /// External LMS id; primary key.
    pub lms_id: String,

    /// Login email.
    pub email: String,

    /// Display name.
    pub name: Option<String>,

    /// `active`, `deactivated`, or the inferred `deleted`.
    pub status: String,

    /// Last recorded activity in the LMS.
    pub last_active_at: Option<DateTime<Utc>>,

    /// When the remote deactivated the account.
    pub deactivated_at: Option<DateTime<Utc>>,

    /// Cursor driving incremental enrollment sync for this user.
    pub enrollment_synced_at: Option<DateTime<Utc>>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload mapped from a fetched LMS user.
#[derive(Debug, Clone)]
pub struct UpsertLmsUser {
    pub lms_id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: LmsUserStatus,
    pub last_active_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl LmsUser {
    /// Insert or refresh a mirrored user. `enrollment_synced_at` is never
    /// touched here; only the enrollment sync advances it.
    pub async fn upsert(pool: &PgPool, data: &UpsertLmsUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO lms_users (lms_id, email, name, status, last_active_at, deactivated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (lms_id) DO UPDATE
            SET email = EXCLUDED.email, name = EXCLUDED.name,
                status = EXCLUDED.status, last_active_at = EXCLUDED.last_active_at,
                deactivated_at = EXCLUDED.deactivated_at, updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&data.lms_id)
        .bind(&data.email)
        .bind(&data.name)
        .bind(data.status.as_str())
        .bind(data.last_active_at)
        .bind(data.deactivated_at)
        .fetch_one(pool)
        .await
    }

    /// Find a user by external id.
    pub async fn find(pool: &PgPool, lms_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_users WHERE lms_id = $1")
            .bind(lms_id)
            .fetch_optional(pool)
            .await
    }

    /// All known external ids, regardless of status.
    pub async fn list_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT lms_id FROM lms_users")
            .fetch_all(pool)
            .await
    }

    /// All users the remote still reports as active.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_users WHERE status = 'active' ORDER BY lms_id")
            .fetch_all(pool)
            .await
    }

    /// Every mirrored user, regardless of status.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lms_users ORDER BY lms_id")
            .fetch_all(pool)
            .await
    }

    /// Whether applying `data` would change any stored field. Identical
    /// resyncs skip the write entirely.
    #[must_use]
    pub fn differs_from(&self, data: &UpsertLmsUser) -> bool {
        self.email != data.email
            || self.name != data.name
            || self.status != data.status.as_str()
            || self.last_active_at != data.last_active_at
            || self.deactivated_at != data.deactivated_at
    }

    /// Mark every id not present in `seen_ids` as deleted. Run only after a
    /// full fetch, where absence is meaningful.
    pub async fn mark_deleted_except(
        pool: &PgPool,
        seen_ids: &[String],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE lms_users
            SET status = 'deleted', updated_at = NOW()
            WHERE status <> 'deleted' AND NOT (lms_id = ANY($1))
            ",
        )
        .bind(seen_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Advance the per-user enrollment sync cursor.
    pub async fn set_enrollment_synced(
        pool: &PgPool,
        lms_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE lms_users SET enrollment_synced_at = $2, updated_at = NOW() WHERE lms_id = $1",
        )
        .bind(lms_id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Users due for an enrollment resync: never synced, active since their
    /// last sync, added to a partner-linked group since their last sync, or
    /// past the staleness window.
    pub async fn enrollment_candidates(
        pool: &PgPool,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT u.* FROM lms_users u
            WHERE u.status = 'active' AND (
                u.enrollment_synced_at IS NULL
                OR u.last_active_at > u.enrollment_synced_at
                OR u.enrollment_synced_at < $1
                OR EXISTS (
                    SELECT 1 FROM group_memberships m
                    JOIN lms_groups g ON g.lms_id = m.group_id
                    WHERE m.user_id = u.lms_id
                      AND g.partner_id IS NOT NULL
                      AND m.added_at > u.enrollment_synced_at
                )
            )
            ORDER BY u.lms_id
            ",
        )
        .bind(stale_before)
        .fetch_all(pool)
        .await
    }
}
