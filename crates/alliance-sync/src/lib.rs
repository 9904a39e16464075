//! Reconciliation engine between the PRM, the LMS and the local store.
//!
//! The engine pulls paginated records from both remote systems, filters them
//! against eligibility rules, matches survivors against existing local rows
//! through a prioritized identity chain, applies create/update/reactivate/
//! soft-delete transitions, and triggers offboarding side effects when a
//! partner or contact goes inactive. Every run writes an audit row whose
//! completion time drives the next incremental run's cursor.
//!
//! All operations are idempotent: re-running the same mode after a crash or
//! a partial failure converges on the same state.

mod contacts;
mod engine;
mod enrollments;
mod error;
mod filter;
mod lms_groups;
mod lms_users;
mod matcher;
mod offboarding;
mod partners;
mod session;
mod stats;

pub use engine::{SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use filter::{
    classify_account, classify_accounts, classify_contact, classify_contacts, classify_lms_user,
    is_valid_email, AccountExclusion, ContactExclusion, FilteredAccounts, FilteredContacts,
};
pub use lms_groups::REASON_NOT_FOUND_IN_LMS;
pub use matcher::{ContactIndex, PartnerIndex};
pub use offboarding::{OffboardOutcome, REASON_PARTNER_OFFBOARDED};
pub use partners::{REASON_FILTERED, REASON_REMOVED};
pub use session::{SessionStats, SyncSession};
pub use stats::SyncStats;
