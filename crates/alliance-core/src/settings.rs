//! Sync engine tunables.

use serde::{Deserialize, Serialize};

use crate::tier::PartnerTier;

/// Configuration for the sync engine and both remote clients.
///
/// Every field has a production default so a bare `SyncSettings::default()`
/// is a working configuration; deployments override individual values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Records requested per PRM page.
    #[serde(default = "default_prm_page_size")]
    pub prm_page_size: u32,
    /// Records requested per LMS page.
    #[serde(default = "default_lms_page_size")]
    pub lms_page_size: u32,
    /// Mandatory sleep between page fetches, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Hard ceiling on pages per collection fetch. A safety valve against
    /// a remote that never stops returning next pages, not a real limit.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Per-request wall-clock timeout, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Consecutive API failures before a client reports unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Tiers eligible for the program.
    #[serde(default = "default_allowed_tiers")]
    pub allowed_tiers: Vec<PartnerTier>,
    /// Account statuses excluded from sync (matched case-insensitively).
    #[serde(default = "default_excluded_statuses")]
    pub excluded_statuses: Vec<String>,
    /// Substrings that disqualify an account name (case-insensitive).
    #[serde(default = "default_excluded_name_terms")]
    pub excluded_name_terms: Vec<String>,
    /// Contact statuses accepted for sync; empty means no restriction.
    #[serde(default = "default_allowed_contact_statuses")]
    pub allowed_contact_statuses: Vec<String>,
    /// Email domains excluded from contact sync (case-insensitive).
    #[serde(default)]
    pub excluded_email_domains: Vec<String>,
    /// Substrings that disqualify an email local part (case-insensitive).
    #[serde(default = "default_excluded_email_terms")]
    pub excluded_email_terms: Vec<String>,

    /// Case-insensitive name of the LMS group holding every partner user.
    #[serde(default = "default_all_partners_group")]
    pub all_partners_group: String,

    /// Days after which a user's enrollments are resynced regardless of
    /// activity.
    #[serde(default = "default_enrollment_staleness_days")]
    pub enrollment_staleness_days: i64,
    /// Concurrent per-user enrollment fetches.
    #[serde(default = "default_enrollment_concurrency")]
    pub enrollment_concurrency: usize,
    /// Enrollment sync aborts once API errors exceed this count and the
    /// number of successes so far.
    #[serde(default = "default_enrollment_error_abort")]
    pub enrollment_error_abort: u32,

    /// Minutes a sync session cache stays valid.
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,
}

fn default_prm_page_size() -> u32 {
    200
}

fn default_lms_page_size() -> u32 {
    100
}

fn default_page_delay_ms() -> u64 {
    250
}

fn default_max_pages() -> u32 {
    500
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_allowed_tiers() -> Vec<PartnerTier> {
    vec![
        PartnerTier::Premier,
        PartnerTier::Certified,
        PartnerTier::Registered,
        PartnerTier::Aggregator,
    ]
}

fn default_excluded_statuses() -> Vec<String> {
    vec!["Inactive".to_string(), "Terminated".to_string()]
}

fn default_excluded_name_terms() -> Vec<String> {
    vec!["do not use".to_string(), "duplicate".to_string()]
}

fn default_allowed_contact_statuses() -> Vec<String> {
    vec!["Active".to_string()]
}

fn default_excluded_email_terms() -> Vec<String> {
    vec!["noreply".to_string(), "donotreply".to_string()]
}

fn default_all_partners_group() -> String {
    "All Partners".to_string()
}

fn default_enrollment_staleness_days() -> i64 {
    7
}

fn default_enrollment_concurrency() -> usize {
    10
}

fn default_enrollment_error_abort() -> u32 {
    10
}

fn default_session_ttl_minutes() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            prm_page_size: default_prm_page_size(),
            lms_page_size: default_lms_page_size(),
            page_delay_ms: default_page_delay_ms(),
            max_pages: default_max_pages(),
            http_timeout_secs: default_http_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            allowed_tiers: default_allowed_tiers(),
            excluded_statuses: default_excluded_statuses(),
            excluded_name_terms: default_excluded_name_terms(),
            allowed_contact_statuses: default_allowed_contact_statuses(),
            excluded_email_domains: Vec::new(),
            excluded_email_terms: default_excluded_email_terms(),
            all_partners_group: default_all_partners_group(),
            enrollment_staleness_days: default_enrollment_staleness_days(),
            enrollment_concurrency: default_enrollment_concurrency(),
            enrollment_error_abort: default_enrollment_error_abort(),
            session_ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = SyncSettings::default();
        assert_eq!(settings.http_timeout_secs, 30);
        assert_eq!(settings.enrollment_staleness_days, 7);
        assert_eq!(settings.enrollment_concurrency, 10);
        assert!(settings.allowed_tiers.contains(&PartnerTier::Premier));
        assert!(!settings.allowed_tiers.contains(&PartnerTier::Distributor));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: SyncSettings = serde_json::from_str(r#"{"prm_page_size": 50}"#).unwrap();
        assert_eq!(settings.prm_page_size, 50);
        assert_eq!(settings.lms_page_size, 100);
        assert_eq!(settings.all_partners_group, "All Partners");
    }
}
