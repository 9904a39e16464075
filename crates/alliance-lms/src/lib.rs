//! LMS API client for the alliance sync engine.
//!
//! The LMS paginates with a `links.next` URL embedded in each response body
//! and filters incrementally via `filter[updated_at][gteq]`. Besides
//! collection reads this crate owns the two mutations offboarding needs:
//! removing people from a group's membership and deleting a group, where a
//! 404 means "already gone" and is not an error.

mod client;
mod error;
mod records;

pub use client::{LmsClient, LmsClientConfig, LmsFetchOutcome};
pub use error::{LmsError, LmsResult};
pub use records::{LmsCourseRecord, LmsEnrollmentRecord, LmsGroupRecord, LmsUserRecord};
