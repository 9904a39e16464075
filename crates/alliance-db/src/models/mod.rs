//! One module per table.

pub mod contact;
pub mod course;
pub mod enrollment;
pub mod group_membership;
pub mod lms_group;
pub mod lms_user;
pub mod partner;
pub mod sync_run;
