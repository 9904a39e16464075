//! Typed views over raw PRM records.
//!
//! Mapping is deliberately lenient: a record missing its name or email still
//! maps, because the eligibility filter is where such records get rejected
//! with a recorded reason. Only a missing id fails the mapping, since an
//! id-less record can never be matched or reconciled.

use serde::{Deserialize, Serialize};

use crate::error::{PrmError, PrmResult};

/// Reads an id field that the PRM serializes as either a number or string.
fn id_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// A partner company record as fetched from the PRM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrmAccount {
    /// External PRM account id.
    pub prm_id: String,
    /// Company name; may be empty (rejected downstream).
    pub name: String,
    /// Raw tier string; validated against the closed tier enum downstream.
    pub tier: Option<String>,
    /// Raw account status string.
    pub status: Option<String>,
    /// Sales region.
    pub region: Option<String>,
    /// Account owner's name.
    pub owner_name: Option<String>,
    /// Account owner's email.
    pub owner_email: Option<String>,
    /// Parent account id, for aggregator hierarchies.
    pub parent_prm_id: Option<String>,
    /// Cross-reference id shared with the CRM.
    pub crm_ref: Option<String>,
}

impl PrmAccount {
    /// Parses an account from a PRM result row.
    pub fn from_json(value: &serde_json::Value) -> PrmResult<Self> {
        Ok(Self {
            prm_id: id_field(value, "id")
                .ok_or_else(|| PrmError::Record("PRM account missing id".into()))?,
            name: str_field(value, "name").unwrap_or_default(),
            tier: str_field(value, "tier"),
            status: str_field(value, "status"),
            region: str_field(value, "region"),
            owner_name: str_field(value, "ownerName"),
            owner_email: str_field(value, "ownerEmail"),
            parent_prm_id: id_field(value, "parentAccountId"),
            crm_ref: str_field(value, "crmAccountId"),
        })
    }
}

/// A person record as fetched from the PRM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrmContact {
    /// External PRM contact id.
    pub prm_id: String,
    /// PRM id of the owning account.
    pub account_prm_id: Option<String>,
    /// Email address; may be empty or invalid (rejected downstream).
    pub email: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Raw contact status string.
    pub status: Option<String>,
}

impl PrmContact {
    /// Parses a contact from a PRM result row.
    pub fn from_json(value: &serde_json::Value) -> PrmResult<Self> {
        Ok(Self {
            prm_id: id_field(value, "id")
                .ok_or_else(|| PrmError::Record("PRM contact missing id".into()))?,
            account_prm_id: id_field(value, "accountId"),
            email: str_field(value, "email").unwrap_or_default(),
            first_name: str_field(value, "firstName"),
            last_name: str_field(value, "lastName"),
            status: str_field(value, "status"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_from_json_complete() {
        let value = json!({
            "id": 10042,
            "name": "Acme Networks",
            "tier": "Premier",
            "status": "Active",
            "region": "EMEA",
            "ownerName": "Pat Field",
            "ownerEmail": "pat@vendor.example",
            "parentAccountId": 10001,
            "crmAccountId": "001A0000012ab3Q"
        });

        let account = PrmAccount::from_json(&value).unwrap();
        assert_eq!(account.prm_id, "10042");
        assert_eq!(account.name, "Acme Networks");
        assert_eq!(account.tier.as_deref(), Some("Premier"));
        assert_eq!(account.parent_prm_id.as_deref(), Some("10001"));
        assert_eq!(account.crm_ref.as_deref(), Some("001A0000012ab3Q"));
    }

    #[test]
    fn test_account_without_name_still_maps() {
        let value = json!({"id": "77", "status": "Active"});
        let account = PrmAccount::from_json(&value).unwrap();
        assert_eq!(account.prm_id, "77");
        assert!(account.name.is_empty());
    }

    #[test]
    fn test_account_missing_id_fails() {
        let value = json!({"name": "No Id Corp"});
        assert!(PrmAccount::from_json(&value).is_err());
    }

    #[test]
    fn test_contact_from_json() {
        let value = json!({
            "id": 20099,
            "accountId": 10042,
            "email": "jane@acme.example",
            "firstName": "Jane",
            "lastName": "Doe",
            "status": "Active"
        });

        let contact = PrmContact::from_json(&value).unwrap();
        assert_eq!(contact.prm_id, "20099");
        assert_eq!(contact.account_prm_id.as_deref(), Some("10042"));
        assert_eq!(contact.email, "jane@acme.example");
    }
}
