//! Identity matching against existing local rows.
//!
//! A remote record resolves to at most one local row through a priority
//! chain; the first rule that hits wins and later rules are never
//! consulted. Reordering the chain changes real matching outcomes (a
//! renamed company would resolve by name before its cross-reference id), so
//! the order is part of the contract:
//!
//! 1. external PRM id
//! 2. cross-reference id, exact
//! 3. cross-reference id, 15-vs-18-character prefix equivalence
//! 4. case-insensitive exact name
//!
//! Contacts use the shorter chain: external PRM id, then email.

use std::collections::HashMap;

use uuid::Uuid;

use alliance_db::{Contact, Partner};
use alliance_prm::{PrmAccount, PrmContact};

/// The upstream CRM truncates some ids to 15 characters; an 18-character id
/// and a 15-character id are equivalent when the first 15 characters match.
fn crm_prefix_key(id: &str) -> Option<&str> {
    if id.len() == 15 || id.len() == 18 {
        id.get(..15)
    } else {
        None
    }
}

/// In-memory index over every local partner row, active or not.
#[derive(Debug, Default)]
pub struct PartnerIndex {
    rows: HashMap<Uuid, Partner>,
    by_prm_id: HashMap<String, Uuid>,
    by_crm_ref: HashMap<String, Uuid>,
    by_crm_prefix: HashMap<String, Uuid>,
    by_name: HashMap<String, Uuid>,
}

impl PartnerIndex {
    /// Builds the index from a full row scan.
    #[must_use]
    pub fn build(partners: Vec<Partner>) -> Self {
        let mut index = Self::default();
        for partner in partners {
            index.register(partner);
        }
        index
    }

    /// Adds a row to the index, or refreshes it after a write. Earlier
    /// entries win key collisions so matching stays deterministic within a
    /// run.
    pub fn register(&mut self, partner: Partner) {
        let id = partner.id;

        if let Some(prm_id) = &partner.prm_id {
            self.by_prm_id.entry(prm_id.clone()).or_insert(id);
        }
        if let Some(crm_ref) = &partner.crm_ref {
            self.by_crm_ref.entry(crm_ref.clone()).or_insert(id);
            if let Some(prefix) = crm_prefix_key(crm_ref) {
                self.by_crm_prefix.entry(prefix.to_string()).or_insert(id);
            }
        }
        let name_key = partner.name.trim().to_lowercase();
        if !name_key.is_empty() {
            self.by_name.entry(name_key).or_insert(id);
        }

        self.rows.insert(id, partner);
    }

    /// Resolves a remote account through the priority chain.
    #[must_use]
    pub fn match_account(&self, account: &PrmAccount) -> Option<&Partner> {
        if let Some(id) = self.by_prm_id.get(&account.prm_id) {
            return self.rows.get(id);
        }

        if let Some(crm_ref) = &account.crm_ref {
            if let Some(id) = self.by_crm_ref.get(crm_ref) {
                return self.rows.get(id);
            }
            if let Some(prefix) = crm_prefix_key(crm_ref) {
                if let Some(id) = self.by_crm_prefix.get(prefix) {
                    return self.rows.get(id);
                }
            }
        }

        let name_key = account.name.trim().to_lowercase();
        if !name_key.is_empty() {
            if let Some(id) = self.by_name.get(&name_key) {
                return self.rows.get(id);
            }
        }

        None
    }

    /// Looks up a partner by its PRM id alone (used when resolving a
    /// contact's owning account).
    #[must_use]
    pub fn find_by_prm_id(&self, prm_id: &str) -> Option<&Partner> {
        self.by_prm_id.get(prm_id).and_then(|id| self.rows.get(id))
    }
}

/// In-memory index over every local contact row, active or not.
#[derive(Debug, Default)]
pub struct ContactIndex {
    rows: HashMap<Uuid, Contact>,
    by_prm_id: HashMap<String, Uuid>,
    by_email: HashMap<String, Uuid>,
}

impl ContactIndex {
    /// Builds the index from a full row scan.
    #[must_use]
    pub fn build(contacts: Vec<Contact>) -> Self {
        let mut index = Self::default();
        for contact in contacts {
            index.register(contact);
        }
        index
    }

    /// Adds a row to the index, or refreshes it after a write.
    pub fn register(&mut self, contact: Contact) {
        let id = contact.id;

        if let Some(prm_id) = &contact.prm_id {
            self.by_prm_id.entry(prm_id.clone()).or_insert(id);
        }
        let email_key = contact.email.trim().to_lowercase();
        if !email_key.is_empty() {
            self.by_email.entry(email_key).or_insert(id);
        }

        self.rows.insert(id, contact);
    }

    /// Resolves a remote contact: external id first, then email.
    #[must_use]
    pub fn match_contact(&self, contact: &PrmContact) -> Option<&Contact> {
        if let Some(id) = self.by_prm_id.get(&contact.prm_id) {
            return self.rows.get(id);
        }

        let email_key = contact.email.trim().to_lowercase();
        if !email_key.is_empty() {
            if let Some(id) = self.by_email.get(&email_key) {
                return self.rows.get(id);
            }
        }

        None
    }

    /// Looks up a contact by email, for linking LMS users.
    #[must_use]
    pub fn find_by_email(&self, email: &str) -> Option<&Contact> {
        self.by_email
            .get(&email.trim().to_lowercase())
            .and_then(|id| self.rows.get(id))
    }
}
