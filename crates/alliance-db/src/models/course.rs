//! Mirrored LMS courses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// A course mirrored from the LMS catalog.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    /// External LMS id; primary key.
    pub lms_id: String,

    /// Course title.
    pub name: String,

    /// Certification units awarded on completion, summed per partner for
    /// tier compliance.
    pub npcu: f64,

    /// Whether the course is still offered.
    pub is_active: bool,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload mapped from a fetched course.
#[derive(Debug, Clone)]
pub struct UpsertCourse {
    pub lms_id: String,
    pub name: String,
    pub npcu: f64,
    pub is_active: bool,
}

impl Course {
    /// Insert or refresh a course.
    pub async fn upsert(pool: &PgPool, data: &UpsertCourse) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO courses (lms_id, name, npcu, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (lms_id) DO UPDATE
            SET name = EXCLUDED.name, npcu = EXCLUDED.npcu,
                is_active = EXCLUDED.is_active, updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&data.lms_id)
        .bind(&data.name)
        .bind(data.npcu)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    /// All known course ids.
    pub async fn list_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT lms_id FROM courses")
            .fetch_all(pool)
            .await
    }
}
