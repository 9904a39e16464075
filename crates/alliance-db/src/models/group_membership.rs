//! Group membership join rows.
//!
//! `added_at` is the one field that must survive refreshes: a member that
//! was already present keeps its original timestamp, which the enrollment
//! sync uses to detect "added to a partner group since last sync".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Membership of one LMS user in one LMS group.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Group external id.
    pub group_id: String,

    /// User external id.
    pub user_id: String,

    /// When the membership was first observed; preserved across refreshes.
    pub added_at: DateTime<Utc>,
}

/// Net effect of a membership refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    /// Members newly inserted.
    pub added: u64,
    /// Members removed because the remote no longer lists them.
    pub removed: u64,
}

impl GroupMembership {
    /// Replace a group's membership with the fetched user ids.
    ///
    /// Existing members stay untouched (their `added_at` is preserved by
    /// `ON CONFLICT DO NOTHING`), missing members are removed, new members
    /// are inserted with the current time.
    pub async fn replace_members(
        pool: &PgPool,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<MembershipDelta, sqlx::Error> {
        let removed = sqlx::query(
            r"
            DELETE FROM group_memberships
            WHERE group_id = $1 AND NOT (user_id = ANY($2))
            ",
        )
        .bind(group_id)
        .bind(user_ids)
        .execute(pool)
        .await?
        .rows_affected();

        let added = sqlx::query(
            r"
            INSERT INTO group_memberships (group_id, user_id)
            SELECT $1, unnested.user_id
            FROM UNNEST($2::TEXT[]) AS unnested (user_id)
            ON CONFLICT (group_id, user_id) DO NOTHING
            ",
        )
        .bind(group_id)
        .bind(user_ids)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(MembershipDelta { added, removed })
    }

    /// Every membership row of a group.
    pub async fn members_of(pool: &PgPool, group_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM group_memberships WHERE group_id = $1 ORDER BY user_id",
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }

    /// Just the user ids of a group's members.
    pub async fn user_ids_of(pool: &PgPool, group_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM group_memberships WHERE group_id = $1 ORDER BY user_id",
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}
