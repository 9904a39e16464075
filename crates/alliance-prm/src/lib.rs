//! PRM API client for the alliance sync engine.
//!
//! The PRM exposes flat collections behind a skip/take pagination protocol
//! with a `{ success, data: { count, results } }` envelope. This crate owns
//! walking that protocol page by page under a rate-limit delay, mapping raw
//! records into typed account/contact structs, and tracking API health so
//! the engine can refuse to start syncs against a failing upstream.

mod client;
mod error;
mod records;

pub use client::{FetchOutcome, PrmClient, PrmClientConfig};
pub use error::{PrmError, PrmResult};
pub use records::{PrmAccount, PrmContact};
