//! Postgres persistence layer for the alliance sync engine.
//!
//! One model per table, each owning its queries. The engine composes these;
//! nothing here reaches out to the remote systems.

mod error;
mod migrations;
pub mod models;
mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::connect;

pub use models::contact::{Contact, NewContact, UpdateContact};
pub use models::course::{Course, UpsertCourse};
pub use models::enrollment::{Enrollment, EnrollmentStatus, UpsertEnrollment};
pub use models::group_membership::{GroupMembership, MembershipDelta};
pub use models::lms_group::{LmsGroup, UpsertLmsGroup};
pub use models::lms_user::{LmsUser, LmsUserStatus, UpsertLmsUser};
pub use models::partner::{NewPartner, Partner, UpdatePartner};
pub use models::sync_run::{RunCounts, SyncRun};
