//! Glue between entity slices and the cache-gated fetch intent.

use crate::api::{ApiRequest, Lifecycle};
use crate::cache::{FetchStatus, SuppressReason};
use crate::config::{Config, Verb};

use super::error::StoreError;
use super::state::AppState;

/// An entity collection that can be loaded from the remote API.
pub trait RemoteResource {
  /// Key in the endpoint registry
  const NAME: &'static str;

  fn status(state: &AppState) -> FetchStatus;

  fn lifecycle() -> Lifecycle;

  /// Envelope for loading the whole collection.
  fn get_request(config: &Config) -> Result<ApiRequest, StoreError> {
    let url = config.route(Self::NAME, Verb::Get)?;
    Ok(ApiRequest::get(url, Self::lifecycle()))
  }
}

/// Per-call options for `Store::get_with_cache`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
  /// Overrides the configured TTL, in minutes
  pub ttl_minutes: Option<i64>,
}

impl QueryOptions {
  pub fn ttl(minutes: i64) -> Self {
    Self {
      ttl_minutes: Some(minutes),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
  /// An envelope was dispatched
  Dispatched,
  /// Nothing was dispatched and no state changed
  Suppressed(SuppressReason),
}
