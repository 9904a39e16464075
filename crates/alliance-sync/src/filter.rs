//! Eligibility classification.
//!
//! Pure and side-effect free. Rejected records keep their exclusion reason
//! because the full-sync deactivation pass must distinguish records that are
//! still present remotely but ineligible from records that vanished
//! entirely; the two get different soft-delete tags.
//!
//! Checks run in a fixed order and stop at the first hit, so every rejected
//! record carries exactly one reason.

use serde::Serialize;

use alliance_core::{PartnerTier, SyncSettings};
use alliance_lms::LmsUserRecord;
use alliance_prm::{PrmAccount, PrmContact};

/// Why an account candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccountExclusion {
    /// Name is empty.
    NoName,
    /// Status is on the exclusion list.
    Inactive,
    /// Tier is unknown or not on the allow-list.
    InvalidTier,
    /// Name contains a disallowed substring.
    ExcludedName,
}

impl AccountExclusion {
    /// Reason tag recorded in run statistics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoName => "noName",
            Self::Inactive => "inactive",
            Self::InvalidTier => "invalidTier",
            Self::ExcludedName => "excludedName",
        }
    }
}

/// Why a contact or learner candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContactExclusion {
    /// Email missing or syntactically invalid.
    InvalidEmail,
    /// Status present but not on the allow-list.
    DisallowedStatus,
    /// Email domain is excluded.
    ExcludedDomain,
    /// Email local part contains a disallowed substring.
    ExcludedLocalPart,
}

impl ContactExclusion {
    /// Reason tag recorded in run statistics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "invalidEmail",
            Self::DisallowedStatus => "disallowedStatus",
            Self::ExcludedDomain => "excludedDomain",
            Self::ExcludedLocalPart => "excludedLocalPart",
        }
    }
}

/// Classified account candidates.
#[derive(Debug)]
pub struct FilteredAccounts {
    /// Records that passed every check.
    pub valid: Vec<PrmAccount>,
    /// Rejected records, each with its single reason.
    pub excluded: Vec<(PrmAccount, AccountExclusion)>,
}

/// Classified contact candidates.
#[derive(Debug)]
pub struct FilteredContacts {
    /// Records that passed every check.
    pub valid: Vec<PrmContact>,
    /// Rejected records, each with its single reason.
    pub excluded: Vec<(PrmContact, ContactExclusion)>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn list_contains_ci(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Practical RFC 5322 email check: one `@`, non-empty local part, a dotted
/// domain, no whitespace, bounded length.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    const MAX_EMAIL_LENGTH: usize = 254;

    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    if email.contains(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    if !domain.contains('.') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }
    if domain.starts_with('-') || domain.ends_with('-') {
        return false;
    }

    true
}

/// Classifies one account candidate. `Err` carries the single reason.
pub fn classify_account(
    account: &PrmAccount,
    settings: &SyncSettings,
) -> Result<(), AccountExclusion> {
    if account.name.trim().is_empty() {
        return Err(AccountExclusion::NoName);
    }

    if let Some(status) = &account.status {
        if list_contains_ci(&settings.excluded_statuses, status) {
            return Err(AccountExclusion::Inactive);
        }
    }

    let tier = account.tier.as_deref().and_then(PartnerTier::parse);
    match tier {
        Some(tier) if settings.allowed_tiers.contains(&tier) => {}
        _ => return Err(AccountExclusion::InvalidTier),
    }

    if settings
        .excluded_name_terms
        .iter()
        .any(|term| contains_ci(&account.name, term))
    {
        return Err(AccountExclusion::ExcludedName);
    }

    Ok(())
}

/// Splits account candidates into valid and excluded sets.
#[must_use]
pub fn classify_accounts(
    accounts: Vec<PrmAccount>,
    settings: &SyncSettings,
) -> FilteredAccounts {
    let mut valid = Vec::new();
    let mut excluded = Vec::new();

    for account in accounts {
        match classify_account(&account, settings) {
            Ok(()) => valid.push(account),
            Err(reason) => excluded.push((account, reason)),
        }
    }

    FilteredAccounts { valid, excluded }
}

fn classify_email(email: &str, settings: &SyncSettings) -> Result<(), ContactExclusion> {
    if !is_valid_email(email) {
        return Err(ContactExclusion::InvalidEmail);
    }

    // Validity was just checked, so the split cannot fail.
    let (local, domain) = email.split_once('@').unwrap_or((email, ""));

    if settings
        .excluded_email_domains
        .iter()
        .any(|excluded| domain.eq_ignore_ascii_case(excluded))
    {
        return Err(ContactExclusion::ExcludedDomain);
    }

    if settings
        .excluded_email_terms
        .iter()
        .any(|term| contains_ci(local, term))
    {
        return Err(ContactExclusion::ExcludedLocalPart);
    }

    Ok(())
}

/// Classifies one contact candidate. `Err` carries the single reason.
pub fn classify_contact(
    contact: &PrmContact,
    settings: &SyncSettings,
) -> Result<(), ContactExclusion> {
    classify_email(&contact.email, settings)?;

    if !settings.allowed_contact_statuses.is_empty() {
        if let Some(status) = &contact.status {
            if !list_contains_ci(&settings.allowed_contact_statuses, status) {
                return Err(ContactExclusion::DisallowedStatus);
            }
        }
    }

    Ok(())
}

/// Splits contact candidates into valid and excluded sets.
#[must_use]
pub fn classify_contacts(
    contacts: Vec<PrmContact>,
    settings: &SyncSettings,
) -> FilteredContacts {
    let mut valid = Vec::new();
    let mut excluded = Vec::new();

    for contact in contacts {
        match classify_contact(&contact, settings) {
            Ok(()) => valid.push(contact),
            Err(reason) => excluded.push((contact, reason)),
        }
    }

    FilteredContacts { valid, excluded }
}

/// Classifies a learner candidate with the contact rules.
pub fn classify_lms_user(
    user: &LmsUserRecord,
    settings: &SyncSettings,
) -> Result<(), ContactExclusion> {
    classify_email(&user.email, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str, tier: &str, status: &str) -> PrmAccount {
        PrmAccount {
            prm_id: "1".to_string(),
            name: name.to_string(),
            tier: Some(tier.to_string()),
            status: Some(status.to_string()),
            region: None,
            owner_name: None,
            owner_email: None,
            parent_prm_id: None,
            crm_ref: None,
        }
    }

    fn settings() -> SyncSettings {
        SyncSettings::default()
    }

    #[test]
    fn test_valid_account_passes() {
        assert!(classify_account(&account("Acme", "Premier", "Active"), &settings()).is_ok());
    }

    #[test]
    fn test_empty_name_rejected_first() {
        // Empty name plus excluded status: the name check runs first.
        let candidate = account("  ", "Premier", "Inactive");
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::NoName)
        );
    }

    #[test]
    fn test_excluded_status_case_insensitive() {
        let candidate = account("Acme", "Premier", "INACTIVE");
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::Inactive)
        );
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let candidate = account("Acme", "Platinum", "Active");
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::InvalidTier)
        );
    }

    #[test]
    fn test_disallowed_tier_rejected() {
        // Distributor is a known tier but not on the default allow-list.
        let candidate = account("Acme", "Distributor", "Active");
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::InvalidTier)
        );
    }

    #[test]
    fn test_missing_tier_rejected() {
        let mut candidate = account("Acme", "Premier", "Active");
        candidate.tier = None;
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::InvalidTier)
        );
    }

    #[test]
    fn test_excluded_name_term() {
        let candidate = account("Acme DUPLICATE record", "Premier", "Active");
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::ExcludedName)
        );
    }

    #[test]
    fn test_reasons_are_single_and_ordered() {
        // Carries every defect at once; only the first check's reason sticks.
        let candidate = account("", "Platinum", "Inactive");
        assert_eq!(
            classify_account(&candidate, &settings()),
            Err(AccountExclusion::NoName)
        );
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name+tag@example.co.uk"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.example.com"));
        assert!(!is_valid_email("user name@example.com"));
    }

    fn contact(email: &str, status: Option<&str>) -> PrmContact {
        PrmContact {
            prm_id: "2".to_string(),
            account_prm_id: Some("1".to_string()),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            status: status.map(String::from),
        }
    }

    #[test]
    fn test_contact_invalid_email() {
        assert_eq!(
            classify_contact(&contact("nope", Some("Active")), &settings()),
            Err(ContactExclusion::InvalidEmail)
        );
    }

    #[test]
    fn test_contact_status_allow_list() {
        assert!(classify_contact(&contact("a@b.example", Some("Active")), &settings()).is_ok());
        assert_eq!(
            classify_contact(&contact("a@b.example", Some("Left Company")), &settings()),
            Err(ContactExclusion::DisallowedStatus)
        );
        // Missing status passes: the allow-list only constrains present values.
        assert!(classify_contact(&contact("a@b.example", None), &settings()).is_ok());
    }

    #[test]
    fn test_contact_excluded_domain() {
        let mut cfg = settings();
        cfg.excluded_email_domains = vec!["competitor.example".to_string()];
        assert_eq!(
            classify_contact(&contact("jane@Competitor.Example", Some("Active")), &cfg),
            Err(ContactExclusion::ExcludedDomain)
        );
    }

    #[test]
    fn test_contact_excluded_local_part() {
        assert_eq!(
            classify_contact(&contact("noreply@acme.example", Some("Active")), &settings()),
            Err(ContactExclusion::ExcludedLocalPart)
        );
    }
}
