//! In-memory transport with scripted responses.
//!
//! Used by tests and by the `--offline` mode of the binary. Responses are
//! keyed by request url; one-shot responses are consumed before the
//! standing response for the same url.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ApiError;
use super::transport::{Transport, TransportRequest};

#[derive(Default)]
struct MockState {
  standing: HashMap<String, Result<Value, ApiError>>,
  queued: HashMap<String, VecDeque<Result<Value, ApiError>>>,
  calls: Vec<TransportRequest>,
  latency: Duration,
}

/// Clones share scripted responses and the call log.
#[derive(Clone, Default)]
pub struct MockTransport {
  state: Arc<Mutex<MockState>>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay every response by `latency` (tokio time, so paused clocks apply).
  pub fn with_latency(self, latency: Duration) -> Self {
    if let Ok(mut state) = self.state.lock() {
      state.latency = latency;
    }
    self
  }

  /// Answer every request for `url` with `response`.
  pub fn respond(&self, url: impl Into<String>, response: Result<Value, ApiError>) {
    if let Ok(mut state) = self.state.lock() {
      state.standing.insert(url.into(), response);
    }
  }

  /// Answer the next request for `url` with `response`.
  pub fn respond_once(&self, url: impl Into<String>, response: Result<Value, ApiError>) {
    if let Ok(mut state) = self.state.lock() {
      state
        .queued
        .entry(url.into())
        .or_default()
        .push_back(response);
    }
  }

  pub fn calls(&self) -> Vec<TransportRequest> {
    self
      .state
      .lock()
      .map(|state| state.calls.clone())
      .unwrap_or_default()
  }

  pub fn call_count(&self) -> usize {
    self.state.lock().map(|state| state.calls.len()).unwrap_or(0)
  }
}

impl Transport for MockTransport {
  fn fetch(&self, request: TransportRequest) -> BoxFuture<'static, Result<Value, ApiError>> {
    let picked = match self.state.lock() {
      Ok(mut state) => {
        let url = request.url.clone();
        state.calls.push(request);

        let queued = state.queued.get_mut(&url).and_then(VecDeque::pop_front);
        let response = queued.or_else(|| state.standing.get(&url).cloned());
        let response = response.unwrap_or_else(|| {
          Err(ApiError::Response {
            status: 404,
            body: format!("no mock response for {}", url),
          })
        });
        (response, state.latency)
      }
      Err(e) => (
        Err(ApiError::Transport(format!("mock transport poisoned: {}", e))),
        Duration::ZERO,
      ),
    };

    Box::pin(async move {
      let (response, latency) = picked;
      if !latency.is_zero() {
        tokio::time::sleep(latency).await;
      }
      response
    })
  }
}
