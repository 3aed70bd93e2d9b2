//! Cache-gated API request dispatcher for an in-memory entity store.
//!
//! A fetch intent (`Store::get_with_cache`) consults the cache gate against
//! the resource's last successful fetch. When allowed, a request envelope is
//! dispatched; `ApiMiddleware` performs the fetch and reports the outcome as
//! start/success/error actions that the entity slices reduce.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod logging;
pub mod store;
