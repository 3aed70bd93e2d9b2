//! Cache gate deciding whether a resource needs a network fetch.
//!
//! The gate is resource-agnostic:
//! - A pure TTL check (`should_fetch`) over the last successful fetch time
//! - A `CachePolicy` that resolves the effective TTL and, optionally,
//!   suppresses a fetch while one is already in flight for the same resource

mod gate;

pub use gate::{elapsed_minutes, should_fetch, CachePolicy, FetchStatus, SuppressReason, Verdict};
