//! Course enrollments and completions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Progress state of an enrollment, recomputed from the remote progress
/// indicator on every sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    /// Derives the status from the remote percentage and completion flag.
    #[must_use]
    pub fn from_progress(percent: f64, completed: bool) -> Self {
        if completed || percent >= 100.0 {
            Self::Completed
        } else if percent > 0.0 {
            Self::InProgress
        } else {
            Self::Enrolled
        }
    }

    /// Stable identifier stored in the `status` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrolled => "enrolled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's enrollment in one course.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    /// Local identifier.
    pub id: Uuid,

    /// External transcript id; the upsert key.
    pub transcript_id: String,

    /// Enrolled user.
    pub lms_user_id: String,

    /// Course enrolled in.
    pub course_id: String,

    /// `enrolled`, `in_progress` or `completed`.
    pub status: String,

    /// Remote progress percentage, 0-100.
    pub percent_complete: f64,

    /// Final score, when the course grades.
    pub score: Option<f64>,

    /// When the user enrolled.
    pub enrolled_at: Option<DateTime<Utc>>,

    /// When the user completed the course.
    pub completed_at: Option<DateTime<Utc>>,

    /// When the certification lapses.
    pub expires_at: Option<DateTime<Utc>>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload mapped from a fetched transcript row.
#[derive(Debug, Clone)]
pub struct UpsertEnrollment {
    pub transcript_id: String,
    pub lms_user_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    pub percent_complete: f64,
    pub score: Option<f64>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// Insert or refresh an enrollment by transcript id.
    pub async fn upsert(pool: &PgPool, data: &UpsertEnrollment) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO enrollments
                (transcript_id, lms_user_id, course_id, status, percent_complete,
                 score, enrolled_at, completed_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (transcript_id) DO UPDATE
            SET status = EXCLUDED.status,
                percent_complete = EXCLUDED.percent_complete,
                score = EXCLUDED.score,
                enrolled_at = EXCLUDED.enrolled_at,
                completed_at = EXCLUDED.completed_at,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&data.transcript_id)
        .bind(&data.lms_user_id)
        .bind(&data.course_id)
        .bind(data.status.as_str())
        .bind(data.percent_complete)
        .bind(data.score)
        .bind(data.enrolled_at)
        .bind(data.completed_at)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    /// All enrollments of one user.
    pub async fn for_user(pool: &PgPool, lms_user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM enrollments WHERE lms_user_id = $1 ORDER BY transcript_id",
        )
        .bind(lms_user_id)
        .fetch_all(pool)
        .await
    }

    /// Whether applying `data` would change any stored field. Identical
    /// resyncs skip the write entirely.
    #[must_use]
    pub fn differs_from(&self, data: &UpsertEnrollment) -> bool {
        self.status != data.status.as_str()
            || (self.percent_complete - data.percent_complete).abs() > f64::EPSILON
            || self.score != data.score
            || self.enrolled_at != data.enrolled_at
            || self.completed_at != data.completed_at
            || self.expires_at != data.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_progress() {
        assert_eq!(
            EnrollmentStatus::from_progress(0.0, false),
            EnrollmentStatus::Enrolled
        );
        assert_eq!(
            EnrollmentStatus::from_progress(42.5, false),
            EnrollmentStatus::InProgress
        );
        assert_eq!(
            EnrollmentStatus::from_progress(100.0, false),
            EnrollmentStatus::Completed
        );
        // The completion flag wins even when the percentage lags.
        assert_eq!(
            EnrollmentStatus::from_progress(80.0, true),
            EnrollmentStatus::Completed
        );
    }
}
