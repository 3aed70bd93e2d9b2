//! In-memory entity store with a middleware pipeline.
//!
//! All reducer applications happen on the task that owns the `Store`.
//! Requests run on spawned tasks and report back through a channel, so the
//! only suspension points are the network calls themselves.

mod action;
pub mod entities;
mod error;
mod middleware;
mod resource;
mod selector;
mod state;
mod status;

pub use action::Action;
pub use error::StoreError;
pub use middleware::{Effects, Logger, Middleware, Task};
pub use resource::{FetchDecision, QueryOptions, RemoteResource};
pub use selector::{Identity, Memo};
pub use state::{reduce, AppState};
pub use status::{Entity, IdAllocator, ResourceStatus};

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ApiMiddleware, Transport};
use crate::cache::{CachePolicy, Verdict};
use crate::clock::Clock;
use crate::config::Config;

enum Message {
  /// Result of a task spawned by a middleware
  Completed(Action),
  /// Action sent through a `StoreHandle`
  External(Action),
}

/// Cloneable sender for dispatching into a store from other tasks.
#[derive(Clone)]
pub struct StoreHandle {
  tx: mpsc::UnboundedSender<Message>,
}

impl StoreHandle {
  /// Queue `action`; it is applied the next time the store is stepped.
  pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
    self
      .tx
      .send(Message::External(action))
      .map_err(|_| StoreError::Closed)
  }
}

pub struct Store {
  state: AppState,
  pipeline: Vec<Box<dyn Middleware>>,
  config: Arc<Config>,
  policy: CachePolicy,
  clock: Arc<dyn Clock>,
  history: VecDeque<&'static str>,
  tx: mpsc::UnboundedSender<Message>,
  rx: mpsc::UnboundedReceiver<Message>,
  /// Spawned tasks whose result has not been applied yet
  pending: usize,
}

impl Store {
  /// Create a store with the logger and API middleware installed.
  pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline: Vec<Box<dyn Middleware>> = vec![
      Box::new(Logger),
      Box::new(ApiMiddleware::new(transport, Arc::clone(&clock))),
    ];

    Self {
      state: AppState::default(),
      pipeline,
      policy: CachePolicy::from(&config.caching),
      config,
      clock,
      history: VecDeque::new(),
      tx,
      rx,
      pending: 0,
    }
  }

  pub fn state(&self) -> &AppState {
    &self.state
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn policy(&self) -> CachePolicy {
    self.policy
  }

  /// Names of the actions that reached the reducer, oldest first.
  pub fn history(&self) -> Vec<&'static str> {
    self.history.iter().copied().collect()
  }

  /// Number of requests still in flight.
  pub fn pending(&self) -> usize {
    self.pending
  }

  pub fn handle(&self) -> StoreHandle {
    StoreHandle {
      tx: self.tx.clone(),
    }
  }

  /// Run `action` through the pipeline and reducer.
  ///
  /// Follow-up actions requested by middleware are applied before this
  /// returns; spawned work is started on the current tokio runtime. A
  /// mutation that fails leaves the state unchanged. Spawned work is started
  /// even when a follow-up is rejected, and the first error is returned.
  ///
  /// # Panics
  ///
  /// Panics if a middleware spawns work while no tokio runtime is running,
  /// as `tokio::spawn` does. Request envelopes always spawn.
  pub fn dispatch(&mut self, action: Action) -> Result<(), StoreError> {
    let mut effects = Effects::default();
    let mut forwarded = Some(action);
    for stage in &self.pipeline {
      forwarded = match forwarded {
        Some(action) => stage.handle(action, &mut effects),
        None => break,
      };
    }

    let result = match forwarded {
      Some(action) => self.apply(&action),
      None => Ok(()),
    };

    // Outcomes are only applied from `step`, so spawning first cannot
    // reorder them ahead of the immediate follow-ups
    let (immediate, tasks) = effects.into_parts();
    for task in tasks {
      self.spawn(task);
    }

    let mut result = result;
    for action in immediate {
      result = result.and(self.dispatch(action));
    }
    result
  }

  fn spawn(&mut self, task: Task) {
    let tx = self.tx.clone();
    self.pending += 1;
    tokio::spawn(async move {
      let action = task.await;
      // Store may have been dropped meanwhile
      let _ = tx.send(Message::Completed(action));
    });
  }

  fn apply(&mut self, action: &Action) -> Result<(), StoreError> {
    match reduce(&self.state, action) {
      Ok(next) => {
        self.state = next;
        self.record(action.type_name());
        Ok(())
      }
      Err(e) => {
        warn!(action = action.type_name(), error = %e, "action rejected");
        Err(e)
      }
    }
  }

  fn record(&mut self, name: &'static str) {
    if self.config.history_limit == 0 {
      return;
    }
    if self.history.len() == self.config.history_limit {
      self.history.pop_front();
    }
    self.history.push_back(name);
  }

  /// Cache-gated fetch of a whole resource collection.
  ///
  /// When the gate suppresses the fetch nothing is dispatched and the state
  /// is left as it was.
  ///
  /// # Panics
  ///
  /// Panics outside a tokio runtime when the gate lets the fetch through.
  pub fn get_with_cache<R: RemoteResource>(
    &mut self,
    options: QueryOptions,
  ) -> Result<FetchDecision, StoreError> {
    let status = R::status(&self.state);
    let now = self.clock.now();

    match self.policy.evaluate(status, options.ttl_minutes, now) {
      Verdict::Suppress(reason) => {
        debug!(resource = R::NAME, ?reason, "fetch suppressed");
        Ok(FetchDecision::Suppressed(reason))
      }
      Verdict::Fetch => {
        let request = R::get_request(&self.config)?;
        debug!(resource = R::NAME, "fetch allowed");
        self.dispatch(Action::ApiRequest(request))?;
        Ok(FetchDecision::Dispatched)
      }
    }
  }

  /// Wait for the next queued action and apply it.
  ///
  /// Returns `false` if the channel is closed.
  pub async fn step(&mut self) -> Result<bool, StoreError> {
    let message = match self.rx.recv().await {
      Some(message) => message,
      None => return Ok(false),
    };

    let action = match message {
      Message::Completed(action) => {
        self.pending = self.pending.saturating_sub(1);
        action
      }
      Message::External(action) => action,
    };

    self.dispatch(action)?;
    Ok(true)
  }

  /// Apply results until no request is in flight.
  pub async fn settle(&mut self) -> Result<(), StoreError> {
    while self.pending > 0 {
      if !self.step().await? {
        break;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiError, ApiRequest, Lifecycle, MockTransport};
  use crate::cache::SuppressReason;
  use crate::clock::ManualClock;
  use crate::store::entities::bugs::{self, Bug, Bugs};
  use crate::store::entities::users::Users;
  use serde_json::json;
  use std::time::Duration;

  const T0: i64 = 1_700_000_000_000;

  fn config(ttl_minutes: i64, dedupe_in_flight: bool) -> Arc<Config> {
    let mut config = Config::default();
    config.caching.ttl_minutes = ttl_minutes;
    config.caching.dedupe_in_flight = dedupe_in_flight;
    Arc::new(config)
  }

  fn store_with(mock: &MockTransport, clock: &ManualClock, config: Arc<Config>) -> Store {
    Store::new(config, Arc::new(mock.clone()), Arc::new(clock.clone()))
  }

  fn bug_list() -> serde_json::Value {
    json!([{"id": 1, "description": "Bug 1", "resolved": false}])
  }

  #[tokio::test(start_paused = true)]
  async fn test_first_fetch_loads_collection() {
    let mock = MockTransport::new().with_latency(Duration::from_millis(200));
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    let decision = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(decision, FetchDecision::Dispatched);
    // Start applied before any suspension point
    assert!(store.state().bugs.loading);
    assert_eq!(
      store.history(),
      vec!["api/callBegan", "bugs/bugApiGetBegan"]
    );

    store.settle().await.unwrap();

    let bugs = &store.state().bugs;
    assert_eq!(
      bugs.items,
      vec![Bug {
        id: 1,
        description: "Bug 1".into(),
        resolved: false,
        user_id: None
      }]
    );
    assert!(!bugs.loading);
    assert_eq!(bugs.last_fetch, Some(T0));
    assert_eq!(store.history().last(), Some(&"bugs/bugApiGetSuccess"));
    assert_eq!(mock.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refetch_inside_ttl_is_noop() {
    let mock = MockTransport::new().with_latency(Duration::from_millis(200));
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();

    let before = store.state().clone();
    let history_before = store.history();
    clock.advance_secs(59);

    let decision = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(decision, FetchDecision::Suppressed(SuppressReason::Fresh));
    assert_eq!(store.pending(), 0);
    assert_eq!(store.history(), history_before);
    assert!(Arc::ptr_eq(&before.bugs, &store.state().bugs));
    assert_eq!(mock.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refetch_after_ttl_expires() {
    let mock = MockTransport::new();
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();

    clock.advance_secs(61);
    let decision = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(decision, FetchDecision::Dispatched);
    assert!(store.state().bugs.loading);

    store.settle().await.unwrap();
    assert_eq!(store.state().bugs.last_fetch, Some(T0 + 61_000));
    assert_eq!(mock.call_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transport_failure_keeps_cached_items() {
    let mock = MockTransport::new();
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();
    let items_before = store.state().bugs.items.clone();

    mock.respond("bugs", Err(ApiError::Transport("connection refused".into())));
    clock.advance_secs(120);
    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();

    let bugs = &store.state().bugs;
    assert_eq!(bugs.items, items_before);
    assert!(!bugs.loading);
    assert_eq!(bugs.last_fetch, Some(T0));
    assert_eq!(
      bugs.last_error,
      Some(ApiError::Transport("connection refused".into()))
    );
    assert_eq!(store.history().last(), Some(&"bugs/bugApiGetFailed"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_first_fetch_does_not_start_ttl_clock() {
    let mock = MockTransport::new();
    mock.respond_once(
      "bugs",
      Err(ApiError::Response {
        status: 503,
        body: String::new(),
      }),
    );
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(10, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();
    assert_eq!(store.state().bugs.last_fetch, None);

    let decision = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(decision, FetchDecision::Dispatched);
    store.settle().await.unwrap();
    assert_eq!(store.state().bugs.items.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_rapid_calls_fetch_once() {
    let mock = MockTransport::new().with_latency(Duration::from_millis(200));
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    let second = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(second, FetchDecision::Suppressed(SuppressReason::InFlight));
    store.settle().await.unwrap();

    let third = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(third, FetchDecision::Suppressed(SuppressReason::Fresh));

    let envelopes = store
      .history()
      .iter()
      .filter(|name| **name == "api/callBegan")
      .count();
    assert_eq!(envelopes, 1);
    assert_eq!(mock.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_first_fetch_without_dedupe() {
    let mock = MockTransport::new().with_latency(Duration::from_millis(200));
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, false));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    let second = store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    assert_eq!(second, FetchDecision::Dispatched);
    assert_eq!(store.pending(), 2);

    store.settle().await.unwrap();
    assert_eq!(mock.call_count(), 2);
    assert!(!store.state().bugs.loading);
  }

  #[tokio::test(start_paused = true)]
  async fn test_ttl_override() {
    let mock = MockTransport::new();
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(30, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();
    clock.advance_secs(5 * 60);

    assert_eq!(
      store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap(),
      FetchDecision::Suppressed(SuppressReason::Fresh)
    );
    assert_eq!(
      store.get_with_cache::<Bugs>(QueryOptions::ttl(5)).unwrap(),
      FetchDecision::Dispatched
    );
    store.settle().await.unwrap();
    assert_eq!(
      store.get_with_cache::<Bugs>(QueryOptions::ttl(0)).unwrap(),
      FetchDecision::Dispatched
    );
    store.settle().await.unwrap();
    assert_eq!(mock.call_count(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_resources_are_cached_independently() {
    let mock = MockTransport::new();
    mock.respond("bugs", Ok(bug_list()));
    mock.respond("users", Ok(json!([{"id": 1, "name": "Ada"}])));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    store.settle().await.unwrap();

    let decision = store.get_with_cache::<Users>(QueryOptions::default()).unwrap();
    assert_eq!(decision, FetchDecision::Dispatched);
    store.settle().await.unwrap();
    assert_eq!(store.state().users.items[0].name, "Ada");
  }

  #[tokio::test]
  async fn test_missing_route_dispatches_nothing() {
    let mock = MockTransport::new();
    let clock = ManualClock::new(T0);
    let mut config = Config::default();
    config.api.routes.clear();
    let mut store = store_with(&mock, &clock, Arc::new(config));

    let err = store
      .get_with_cache::<Bugs>(QueryOptions::default())
      .unwrap_err();
    assert!(matches!(err, StoreError::MissingRoute { resource: "bugs", .. }));
    assert!(store.history().is_empty());
  }

  #[tokio::test]
  async fn test_rejected_mutation_leaves_state() {
    let mock = MockTransport::new();
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    store.dispatch(bugs::bug_added("Bug 1")).unwrap();
    let before = Arc::clone(&store.state().bugs);

    let err = store.dispatch(bugs::bug_resolved(2)).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { id: 2, .. }));
    assert!(Arc::ptr_eq(&before, &store.state().bugs));
    assert_eq!(store.history(), vec!["bugs/bugAdded"]);
  }

  #[tokio::test]
  async fn test_handle_dispatches_from_other_tasks() {
    let mock = MockTransport::new();
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));
    let handle = store.handle();

    tokio::spawn(async move {
      handle.dispatch(bugs::bug_added("From elsewhere")).unwrap();
    })
    .await
    .unwrap();

    assert!(store.step().await.unwrap());
    assert_eq!(store.state().bugs.items[0].description, "From elsewhere");
  }

  #[tokio::test]
  async fn test_history_is_bounded() {
    let mock = MockTransport::new();
    let clock = ManualClock::new(T0);
    let mut config = Config::default();
    config.history_limit = 2;
    let mut store = store_with(&mock, &clock, Arc::new(config));

    for n in 0..3 {
      store.dispatch(bugs::bug_added(format!("Bug {}", n))).unwrap();
    }
    store.dispatch(bugs::bug_resolved(1)).unwrap();

    assert_eq!(store.history(), vec!["bugs/bugAdded", "bugs/bugResolved"]);
  }

  fn resolve_missing_bug() -> Action {
    bugs::bug_resolved(99)
  }

  #[tokio::test(start_paused = true)]
  async fn test_rejected_start_action_still_reports_outcome() {
    let mock = MockTransport::new().with_latency(Duration::from_millis(200));
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    let lifecycle = Lifecycle {
      on_start: resolve_missing_bug,
      ..bugs::lifecycle()
    };
    let err = store
      .dispatch(Action::ApiRequest(ApiRequest::get("bugs", lifecycle)))
      .unwrap_err();
    assert_eq!(
      err,
      StoreError::NotFound {
        resource: "bugs",
        id: 99
      }
    );
    assert_eq!(mock.call_count(), 1);
    assert_eq!(store.pending(), 1);

    store.settle().await.unwrap();
    assert_eq!(store.pending(), 0);
    assert_eq!(store.state().bugs.items.len(), 1);
    assert_eq!(store.history().last(), Some(&"bugs/bugApiGetSuccess"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_unrelated_action_while_pending() {
    let mock = MockTransport::new().with_latency(Duration::from_millis(200));
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));
    let handle = store.handle();

    store.get_with_cache::<Bugs>(QueryOptions::default()).unwrap();
    handle.dispatch(bugs::bug_added("Local only")).unwrap();

    // The local addition lands first, while the request is still loading
    assert!(store.step().await.unwrap());
    assert!(store.state().bugs.loading);
    assert_eq!(store.state().bugs.items[0].description, "Local only");
    assert_eq!(store.pending(), 1);

    // Success replaces the whole collection
    store.settle().await.unwrap();
    let bugs = &store.state().bugs;
    assert!(!bugs.loading);
    assert_eq!(bugs.items.len(), 1);
    assert_eq!(bugs.items[0].description, "Bug 1");
    assert_eq!(
      store.history(),
      vec![
        "api/callBegan",
        "bugs/bugApiGetBegan",
        "bugs/bugAdded",
        "bugs/bugApiGetSuccess"
      ]
    );
  }

  #[test]
  #[should_panic]
  fn test_envelope_outside_runtime_panics() {
    let mock = MockTransport::new();
    mock.respond("bugs", Ok(bug_list()));
    let clock = ManualClock::new(T0);
    let mut store = store_with(&mock, &clock, config(1, true));

    let _ = store.get_with_cache::<Bugs>(QueryOptions::default());
  }
}
