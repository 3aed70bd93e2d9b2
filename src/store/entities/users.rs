//! User collection. Reuses the generic remote lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::{ApiError, Lifecycle};
use crate::cache::FetchStatus;
use crate::clock::Timestamp;
use crate::store::action::Action;
use crate::store::error::StoreError;
use crate::store::resource::RemoteResource;
use crate::store::state::AppState;
use crate::store::status::{Entity, ResourceStatus};

pub const RESOURCE: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  #[serde(default)]
  pub name: String,
}

impl Entity for User {
  fn id(&self) -> u64 {
    self.id
  }
}

pub type UsersState = ResourceStatus<User>;

#[derive(Debug, Clone)]
pub enum UserAction {
  Added { name: String },
  ApiGetBegan,
  ApiGetSucceeded { users: Vec<User>, fetched_at: Timestamp },
  ApiGetFailed(ApiError),
}

impl UserAction {
  pub fn type_name(&self) -> &'static str {
    match self {
      UserAction::Added { .. } => "users/userAdded",
      UserAction::ApiGetBegan => "users/userApiGetBegan",
      UserAction::ApiGetSucceeded { .. } => "users/userApiGetSuccess",
      UserAction::ApiGetFailed(_) => "users/userApiGetFailed",
    }
  }
}

pub fn reduce(users: &Arc<UsersState>, action: &UserAction) -> Result<Arc<UsersState>, StoreError> {
  let next = match action {
    UserAction::Added { name } => users
      .with_added(|id| User {
        id,
        name: name.clone(),
      })
      .ok_or(StoreError::IdsExhausted { resource: RESOURCE })?,
    UserAction::ApiGetBegan => users.began(),
    UserAction::ApiGetSucceeded {
      users: fetched,
      fetched_at,
    } => users.succeeded(fetched.clone(), *fetched_at),
    UserAction::ApiGetFailed(error) => users.failed(error.clone()),
  };

  Ok(Arc::new(next))
}

pub fn user_added(name: impl Into<String>) -> Action {
  Action::Users(UserAction::Added { name: name.into() })
}

fn api_get_began() -> Action {
  Action::Users(UserAction::ApiGetBegan)
}

fn api_get_succeeded(body: Value, fetched_at: Timestamp) -> serde_json::Result<Action> {
  let users: Vec<User> = serde_json::from_value(body)?;
  Ok(Action::Users(UserAction::ApiGetSucceeded { users, fetched_at }))
}

fn api_get_failed(error: ApiError) -> Action {
  Action::Users(UserAction::ApiGetFailed(error))
}

pub fn lifecycle() -> Lifecycle {
  Lifecycle {
    on_start: api_get_began,
    on_success: api_get_succeeded,
    on_error: Some(api_get_failed),
  }
}

/// Marker for `Store::get_with_cache::<Users>`.
pub struct Users;

impl RemoteResource for Users {
  const NAME: &'static str = RESOURCE;

  fn status(state: &AppState) -> FetchStatus {
    state.users.fetch_status()
  }

  fn lifecycle() -> Lifecycle {
    lifecycle()
  }
}
