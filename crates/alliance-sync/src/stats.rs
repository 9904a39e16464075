//! Per-run statistics.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use alliance_db::RunCounts;

/// Counts and details accumulated over one sync run.
///
/// Row-level failures land in `errors` instead of aborting the run; the
/// trigger surface returns the whole object to callers even when individual
/// rows failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Remote records examined.
    pub processed: u32,
    /// New local rows inserted.
    pub created: u32,
    /// Existing rows whose fields actually changed.
    pub updated: u32,
    /// Rows soft-deleted (or marked deleted) this run.
    pub deactivated: u32,
    /// Soft-deleted rows brought back.
    pub reactivated: u32,
    /// Rows whose write failed.
    pub failed: u32,
    /// Records the eligibility filter rejected, by reason tag.
    pub excluded: BTreeMap<String, u32>,
    /// Learner fetches that returned 404 (expected churn, not errors).
    pub users_not_found: u32,
    /// Remote fetch failures below the engine level.
    pub api_errors: u32,
    /// Successful per-entity remote operations, for the abort ratio.
    pub successes: u32,
    /// Row-level and side-effect error descriptions.
    pub errors: Vec<String>,
}

impl SyncStats {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one excluded record under its reason tag.
    pub fn record_exclusion(&mut self, reason: &str) {
        *self.excluded.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Records a row-level failure with its description.
    pub fn record_error(&mut self, context: &str, error: &impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("{context}: {error}"));
    }

    /// The persistent counter subset for the audit row.
    #[must_use]
    pub fn counts(&self) -> RunCounts {
        RunCounts {
            processed: cap(self.processed),
            created: cap(self.created),
            updated: cap(self.updated),
            deactivated: cap(self.deactivated),
            reactivated: cap(self.reactivated),
            failed: cap(self.failed),
        }
    }

    /// The free-form detail blob for the audit row.
    #[must_use]
    pub fn detail(&self) -> serde_json::Value {
        json!({
            "excluded": self.excluded,
            "users_not_found": self.users_not_found,
            "api_errors": self.api_errors,
            "errors": self.errors,
        })
    }
}

fn cap(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusions_accumulate_by_reason() {
        let mut stats = SyncStats::new();
        stats.record_exclusion("invalidTier");
        stats.record_exclusion("invalidTier");
        stats.record_exclusion("noName");

        assert_eq!(stats.excluded.get("invalidTier"), Some(&2));
        assert_eq!(stats.excluded.get("noName"), Some(&1));
    }

    #[test]
    fn test_record_error_increments_failed() {
        let mut stats = SyncStats::new();
        stats.record_error("partner Acme", &"boom");
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("Acme"));
    }

    #[test]
    fn test_counts_mirror_fields() {
        let stats = SyncStats {
            processed: 10,
            created: 2,
            updated: 3,
            deactivated: 1,
            reactivated: 1,
            failed: 1,
            ..SyncStats::default()
        };
        let counts = stats.counts();
        assert_eq!(counts.processed, 10);
        assert_eq!(counts.created, 2);
        assert_eq!(counts.updated, 3);
        assert_eq!(counts.deactivated, 1);
        assert_eq!(counts.reactivated, 1);
        assert_eq!(counts.failed, 1);
    }
}
