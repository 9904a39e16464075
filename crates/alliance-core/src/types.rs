//! Sync run classification enums shared between the engine and the store.

use serde::{Deserialize, Serialize};

/// What a sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Partner companies from the PRM.
    Partners,
    /// Partner contacts from the PRM.
    Contacts,
    /// Learner accounts from the LMS.
    LmsUsers,
    /// Cohort groups and their memberships from the LMS.
    LmsGroups,
    /// Course enrollments and completions from the LMS.
    Enrollments,
}

impl SyncType {
    /// Stable identifier used in the `sync_runs` table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Partners => "partners",
            Self::Contacts => "contacts",
            Self::LmsUsers => "lms_users",
            Self::LmsGroups => "lms_groups",
            Self::Enrollments => "enrollments",
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a run fetches everything or only records changed since the last
/// successful run of the same type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Fetch the whole remote collection; the only mode that may deactivate.
    Full,
    /// Fetch records updated since the last completed run.
    #[default]
    Incremental,
}

impl SyncMode {
    /// Stable identifier used in the `sync_runs` table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    /// Parses a mode flag as received from the trigger surface.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a sync run. Runs only ever move forward to a terminal
/// state; they are never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in flight.
    Running,
    /// Run finished; its `completed_at` feeds the incremental cursor.
    Completed,
    /// Run hit an unrecoverable condition or the error-rate abort.
    Failed,
}

impl RunStatus {
    /// Stable identifier used in the `sync_runs` table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status ends a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(SyncMode::parse("full"), Some(SyncMode::Full));
        assert_eq!(SyncMode::parse("Incremental"), Some(SyncMode::Incremental));
        assert_eq!(SyncMode::parse("weekly"), None);
    }

    #[test]
    fn test_mode_default_is_incremental() {
        assert_eq!(SyncMode::default(), SyncMode::Incremental);
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
