//! Typed views over raw LMS records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LmsError, LmsResult};

fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn id_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn ts_field(value: &serde_json::Value, key: &str) -> Option<DateTime<Utc>> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// A learner account as fetched from the LMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsUserRecord {
    /// External LMS id.
    pub lms_id: String,
    /// Login email; may be empty (rejected downstream).
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Raw status string, `active` or `deactivated`.
    pub status: Option<String>,
    /// Last recorded activity.
    pub last_active_at: Option<DateTime<Utc>>,
    /// When the remote deactivated the account.
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl LmsUserRecord {
    /// Parses a user from an LMS data row.
    pub fn from_json(value: &serde_json::Value) -> LmsResult<Self> {
        Ok(Self {
            lms_id: id_field(value, "id")
                .ok_or_else(|| LmsError::Record("LMS user missing id".into()))?,
            email: str_field(value, "email").unwrap_or_default(),
            name: str_field(value, "name"),
            status: str_field(value, "status"),
            last_active_at: ts_field(value, "last_active_at"),
            deactivated_at: ts_field(value, "deactivated_at"),
        })
    }

    /// Whether the remote reports the account as active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|s| s.eq_ignore_ascii_case("active"))
    }
}

/// A cohort group as fetched from the LMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsGroupRecord {
    /// External LMS id.
    pub lms_id: String,
    /// Group display name.
    pub name: String,
    /// Member count reported by the remote, when the endpoint includes it.
    pub member_count: Option<i64>,
}

impl LmsGroupRecord {
    /// Parses a group from an LMS data row.
    pub fn from_json(value: &serde_json::Value) -> LmsResult<Self> {
        Ok(Self {
            lms_id: id_field(value, "id")
                .ok_or_else(|| LmsError::Record("LMS group missing id".into()))?,
            name: str_field(value, "name").unwrap_or_default(),
            member_count: value.get("user_count").and_then(|v| v.as_i64()),
        })
    }
}

/// A catalog course as fetched from the LMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsCourseRecord {
    /// External LMS id.
    pub lms_id: String,
    /// Course title.
    pub name: String,
    /// Certification units awarded on completion.
    pub npcu: f64,
    /// Whether the course is still offered.
    pub is_active: bool,
}

impl LmsCourseRecord {
    /// Parses a course from an LMS data row.
    pub fn from_json(value: &serde_json::Value) -> LmsResult<Self> {
        Ok(Self {
            lms_id: id_field(value, "id")
                .ok_or_else(|| LmsError::Record("LMS course missing id".into()))?,
            name: str_field(value, "name").unwrap_or_default(),
            npcu: value
                .get("certification_units")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            is_active: value
                .get("active")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        })
    }
}

/// One transcript row from a user's enrollment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsEnrollmentRecord {
    /// External transcript id; the local upsert key.
    pub transcript_id: String,
    /// Enrolled user's LMS id.
    pub user_id: String,
    /// Course LMS id.
    pub course_id: String,
    /// Remote progress percentage, 0-100.
    pub percent: f64,
    /// Remote completion flag; wins over a lagging percentage.
    pub completed: bool,
    /// When the user enrolled.
    pub enrolled_at: Option<DateTime<Utc>>,
    /// When the user completed the course.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the certification lapses.
    pub expires_at: Option<DateTime<Utc>>,
    /// Final score, when graded.
    pub score: Option<f64>,
}

impl LmsEnrollmentRecord {
    /// Parses a transcript row from an LMS data row.
    pub fn from_json(value: &serde_json::Value) -> LmsResult<Self> {
        Ok(Self {
            transcript_id: id_field(value, "id")
                .ok_or_else(|| LmsError::Record("LMS enrollment missing id".into()))?,
            user_id: id_field(value, "user_id")
                .ok_or_else(|| LmsError::Record("LMS enrollment missing user_id".into()))?,
            course_id: id_field(value, "course_id")
                .ok_or_else(|| LmsError::Record("LMS enrollment missing course_id".into()))?,
            percent: value
                .get("percentage_complete")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            completed: value
                .get("completed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            enrolled_at: ts_field(value, "enrolled_at"),
            completed_at: ts_field(value, "completed_at"),
            expires_at: ts_field(value, "expires_at"),
            score: value.get("score").and_then(|v| v.as_f64()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_from_json() {
        let value = json!({
            "id": "u-100",
            "email": "sam@partner.example",
            "name": "Sam Rivers",
            "status": "active",
            "last_active_at": "2025-06-01T08:30:00Z"
        });

        let user = LmsUserRecord::from_json(&value).unwrap();
        assert_eq!(user.lms_id, "u-100");
        assert!(user.is_active());
        assert!(user.last_active_at.is_some());
        assert!(user.deactivated_at.is_none());
    }

    #[test]
    fn test_user_deactivated_status() {
        let value = json!({"id": "u-101", "email": "x@y.example", "status": "deactivated"});
        let user = LmsUserRecord::from_json(&value).unwrap();
        assert!(!user.is_active());
    }

    #[test]
    fn test_group_member_count_optional() {
        let with = json!({"id": "g-1", "name": "Acme Networks", "user_count": 12});
        assert_eq!(
            LmsGroupRecord::from_json(&with).unwrap().member_count,
            Some(12)
        );

        let without = json!({"id": "g-2", "name": "All Partners"});
        assert_eq!(LmsGroupRecord::from_json(&without).unwrap().member_count, None);
    }

    #[test]
    fn test_enrollment_requires_joins() {
        let value = json!({"id": "t-1", "user_id": "u-1"});
        assert!(LmsEnrollmentRecord::from_json(&value).is_err());

        let full = json!({
            "id": "t-1",
            "user_id": "u-1",
            "course_id": "c-9",
            "percentage_complete": 45.0
        });
        let enrollment = LmsEnrollmentRecord::from_json(&full).unwrap();
        assert_eq!(enrollment.course_id, "c-9");
        assert!(!enrollment.completed);
    }
}
