//! Shared building blocks for the alliance sync engine.
//!
//! This crate holds the pieces every other alliance crate leans on:
//!
//! - [`SyncSettings`] — tunables for pagination, rate limiting, eligibility
//!   rules and the enrollment staleness window
//! - [`PartnerTier`] — the closed tier enumeration with its NPCU
//!   requirement mapping
//! - [`HealthMonitor`] — consecutive-failure tracking that gates large sync
//!   operations after sustained API errors
//! - [`ProgressEvent`] / [`ProgressReporter`] — typed, non-blocking progress
//!   reporting over a channel

mod health;
mod progress;
mod settings;
mod tier;
mod types;

pub use health::{HealthMonitor, HealthSnapshot};
pub use progress::{progress_channel, ProgressEvent, ProgressReporter};
pub use settings::SyncSettings;
pub use tier::PartnerTier;
pub use types::{RunStatus, SyncMode, SyncType};
