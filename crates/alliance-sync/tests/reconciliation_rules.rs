//! Cross-module properties of the pure reconciliation layer: eligibility
//! partitioning and the identity chain, exercised through the public API.

use chrono::Utc;
use uuid::Uuid;

use alliance_core::SyncSettings;
use alliance_db::Partner;
use alliance_prm::PrmAccount;
use alliance_sync::{classify_accounts, AccountExclusion, PartnerIndex};

fn account(prm_id: &str, name: &str, tier: &str, status: &str) -> PrmAccount {
    PrmAccount {
        prm_id: prm_id.to_string(),
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

fn partner(name: &str, prm_id: Option<&str>, crm_ref: Option<&str>) -> Partner {
    Partner {
        id: Uuid::new_v4(),
        name: name.to_string(),
        tier: "Premier".to_string(),
        status: "Active".to_string(),
        region: None,
        owner_name: None,
        owner_email: None,
        prm_id: prm_id.map(String::from),
        prm_parent_id: None,
        crm_ref: crm_ref.map(String::from),
        is_active: true,
        deactivated_at: None,
        deactivation_reason: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn test_classification_is_a_partition() {
    let settings = SyncSettings::default();
    let batch = vec![
        account("1", "Acme", "Premier", "Active"),
        account("2", "", "Premier", "Active"),
        account("3", "Globex", "Premier", "Terminated"),
        account("4", "Initech", "Platinum", "Active"),
        account("5", "Hooli duplicate", "Certified", "Active"),
        account("6", "Umbrella", "Registered", "Active"),
    ];
    let total = batch.len();

    let filtered = classify_accounts(batch, &settings);

    // Nothing lost, nothing in both sets.
    assert_eq!(filtered.valid.len() + filtered.excluded.len(), total);
    assert_eq!(filtered.valid.len(), 2);

    // Every rejected record carries exactly one of the four reasons.
    let reasons: Vec<AccountExclusion> =
        filtered.excluded.iter().map(|(_, reason)| *reason).collect();
    assert_eq!(
        reasons,
        vec![
            AccountExclusion::NoName,
            AccountExclusion::Inactive,
            AccountExclusion::InvalidTier,
            AccountExclusion::ExcludedName,
        ]
    );
}

#[test]
fn test_identity_chain_priority_over_a_populated_index() {
    let renamed = partner("Old Corporate Name", Some("100"), Some("001A0000012ab3Q"));
    let decoy_by_ref = partner("Ref Decoy", Some("900"), Some("001B0000099xx9X"));
    let decoy_by_name = partner("Fresh Corporate Name", Some("901"), None);
    let renamed_id = renamed.id;

    let index = PartnerIndex::build(vec![renamed, decoy_by_ref, decoy_by_name]);

    // External id wins even though the name now points at another row.
    let mut candidate = account("100", "Fresh Corporate Name", "Premier", "Active");
    candidate.crm_ref = Some("001A0000012ab3Q".to_string());
    assert_eq!(index.match_account(&candidate).unwrap().id, renamed_id);
}

#[test]
fn test_prefix_equivalence_is_bidirectional_and_exact() {
    let short_ref = partner("Short Ref", None, Some("001A0000012ab3Q"));
    let long_ref = partner("Long Ref", None, Some("002B0000034cd5RSTU"));
    let short_id = short_ref.id;
    let long_id = long_ref.id;
    let index = PartnerIndex::build(vec![short_ref, long_ref]);

    // 18-char remote resolving a 15-char stored id.
    let mut candidate = account("200", "Nobody", "Premier", "Active");
    candidate.crm_ref = Some("001A0000012ab3QABC".to_string());
    assert_eq!(index.match_account(&candidate).unwrap().id, short_id);

    // 15-char remote resolving an 18-char stored id.
    let mut candidate = account("201", "Nobody", "Premier", "Active");
    candidate.crm_ref = Some("002B0000034cd5R".to_string());
    assert_eq!(index.match_account(&candidate).unwrap().id, long_id);

    // 14 shared characters: no match.
    let mut candidate = account("202", "Nobody", "Premier", "Active");
    candidate.crm_ref = Some("001A0000012ab9".to_string());
    assert!(index.match_account(&candidate).is_none());
}

#[test]
fn test_link_candidates_resolve_by_name_when_unlinked() {
    // A row imported through another channel: no external id yet. The
    // link step of the deactivation pass finds it by the later rules.
    let imported = partner("Imported Partner", None, None);
    let imported_id = imported.id;
    let index = PartnerIndex::build(vec![imported]);

    let candidate = account("300", "imported partner", "Premier", "Active");
    let matched = index.match_account(&candidate).unwrap();
    assert_eq!(matched.id, imported_id);
    assert!(matched.prm_id.is_none());
}
