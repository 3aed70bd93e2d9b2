//! Bug collection: domain mutations, remote lifecycle and selectors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::{ApiError, Lifecycle};
use crate::cache::FetchStatus;
use crate::clock::Timestamp;
use crate::store::action::Action;
use crate::store::error::StoreError;
use crate::store::resource::RemoteResource;
use crate::store::selector::Memo;
use crate::store::state::AppState;
use crate::store::status::{Entity, ResourceStatus};

use super::users::User;

pub const RESOURCE: &str = "bugs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
  pub id: u64,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub resolved: bool,
  /// Assigned user
  #[serde(default, rename = "user")]
  pub user_id: Option<u64>,
}

impl Entity for Bug {
  fn id(&self) -> u64 {
    self.id
  }
}

pub type BugsState = ResourceStatus<Bug>;

#[derive(Debug, Clone)]
pub enum BugAction {
  Added { description: String },
  Resolved { id: u64 },
  Assigned { id: u64, user_id: u64 },
  ApiGetBegan,
  ApiGetSucceeded { bugs: Vec<Bug>, fetched_at: Timestamp },
  ApiGetFailed(ApiError),
}

impl BugAction {
  pub fn type_name(&self) -> &'static str {
    match self {
      BugAction::Added { .. } => "bugs/bugAdded",
      BugAction::Resolved { .. } => "bugs/bugResolved",
      BugAction::Assigned { .. } => "bugs/bugAssigned",
      BugAction::ApiGetBegan => "bugs/bugApiGetBegan",
      BugAction::ApiGetSucceeded { .. } => "bugs/bugApiGetSuccess",
      BugAction::ApiGetFailed(_) => "bugs/bugApiGetFailed",
    }
  }
}

pub fn reduce(bugs: &Arc<BugsState>, action: &BugAction) -> Result<Arc<BugsState>, StoreError> {
  let next = match action {
    BugAction::Added { description } => bugs
      .with_added(|id| Bug {
        id,
        description: description.clone(),
        resolved: false,
        user_id: None,
      })
      .ok_or(StoreError::IdsExhausted { resource: RESOURCE })?,
    BugAction::Resolved { id } => bugs
      .with_updated(*id, |bug| bug.resolved = true)
      .ok_or(StoreError::NotFound {
        resource: RESOURCE,
        id: *id,
      })?,
    BugAction::Assigned { id, user_id } => bugs
      .with_updated(*id, |bug| bug.user_id = Some(*user_id))
      .ok_or(StoreError::NotFound {
        resource: RESOURCE,
        id: *id,
      })?,
    BugAction::ApiGetBegan => bugs.began(),
    BugAction::ApiGetSucceeded {
      bugs: fetched,
      fetched_at,
    } => bugs.succeeded(fetched.clone(), *fetched_at),
    BugAction::ApiGetFailed(error) => bugs.failed(error.clone()),
  };

  Ok(Arc::new(next))
}

// ============================================================================
// Action creators
// ============================================================================

pub fn bug_added(description: impl Into<String>) -> Action {
  Action::Bugs(BugAction::Added {
    description: description.into(),
  })
}

pub fn bug_resolved(id: u64) -> Action {
  Action::Bugs(BugAction::Resolved { id })
}

pub fn bug_assigned(id: u64, user_id: u64) -> Action {
  Action::Bugs(BugAction::Assigned { id, user_id })
}

fn api_get_began() -> Action {
  Action::Bugs(BugAction::ApiGetBegan)
}

fn api_get_succeeded(body: Value, fetched_at: Timestamp) -> serde_json::Result<Action> {
  let bugs: Vec<Bug> = serde_json::from_value(body)?;
  Ok(Action::Bugs(BugAction::ApiGetSucceeded { bugs, fetched_at }))
}

fn api_get_failed(error: ApiError) -> Action {
  Action::Bugs(BugAction::ApiGetFailed(error))
}

pub fn lifecycle() -> Lifecycle {
  Lifecycle {
    on_start: api_get_began,
    on_success: api_get_succeeded,
    on_error: Some(api_get_failed),
  }
}

/// Marker for `Store::get_with_cache::<Bugs>`.
pub struct Bugs;

impl RemoteResource for Bugs {
  const NAME: &'static str = RESOURCE;

  fn status(state: &AppState) -> FetchStatus {
    state.bugs.fetch_status()
  }

  fn lifecycle() -> Lifecycle {
    lifecycle()
  }
}

// ============================================================================
// Selectors
// ============================================================================

/// Unresolved bugs, computed on every call.
pub fn unresolved_bugs(state: &AppState) -> Vec<Bug> {
  state
    .bugs
    .items
    .iter()
    .filter(|bug| !bug.resolved)
    .cloned()
    .collect()
}

type BugList = Arc<Vec<Bug>>;

/// Memoized bug views. Keep one instance per consumer.
pub struct BugSelectors {
  resolved: Memo<Arc<BugsState>, BugList>,
  with_known_assignee: Memo<(Arc<BugsState>, Arc<ResourceStatus<User>>), BugList>,
}

impl Default for BugSelectors {
  fn default() -> Self {
    Self::new()
  }
}

impl BugSelectors {
  pub fn new() -> Self {
    Self {
      resolved: Memo::new(|bugs: &Arc<BugsState>| {
        Arc::new(bugs.items.iter().filter(|b| b.resolved).cloned().collect())
      }),
      with_known_assignee: Memo::new(
        |(bugs, users): &(Arc<BugsState>, Arc<ResourceStatus<User>>)| {
          Arc::new(
            bugs
              .items
              .iter()
              .filter(|b| b.user_id.is_some_and(|uid| users.find(uid).is_some()))
              .cloned()
              .collect(),
          )
        },
      ),
    }
  }

  pub fn resolved(&mut self, state: &AppState) -> BugList {
    self.resolved.select(Arc::clone(&state.bugs))
  }

  /// Bugs whose assignee exists in the user collection.
  pub fn with_known_assignee(&mut self, state: &AppState) -> BugList {
    self
      .with_known_assignee
      .select((Arc::clone(&state.bugs), Arc::clone(&state.users)))
  }

  pub fn resolved_recomputations(&self) -> usize {
    self.resolved.recomputations()
  }

  pub fn with_known_assignee_recomputations(&self) -> usize {
    self.with_known_assignee.recomputations()
  }
}

/// Memoized selector for the bugs assigned to `user_id`.
pub fn bugs_by_user(user_id: u64) -> Memo<Arc<BugsState>, BugList> {
  Memo::new(move |bugs: &Arc<BugsState>| {
    Arc::new(
      bugs
        .items
        .iter()
        .filter(|b| b.user_id == Some(user_id))
        .cloned()
        .collect(),
    )
  })
}
