use std::sync::Arc;

use crate::api::ApiError;

use super::action::Action;
use super::entities::bugs::{self, BugsState};
use super::entities::projects::{self, ProjectsState};
use super::entities::users::{self, UsersState};
use super::error::StoreError;

/// Whole store state. Slices are shared; a reducer only swaps the `Arc` of
/// the slice it changes.
#[derive(Debug, Clone, Default)]
pub struct AppState {
  pub bugs: Arc<BugsState>,
  pub users: Arc<UsersState>,
  pub projects: Arc<ProjectsState>,
  /// Last failure reported through `Action::ApiCallFailed`
  pub last_api_error: Option<ApiError>,
}

/// Root reducer. Builds the next state from `state` without modifying it.
pub fn reduce(state: &AppState, action: &Action) -> Result<AppState, StoreError> {
  let next = match action {
    Action::Bugs(action) => AppState {
      bugs: bugs::reduce(&state.bugs, action)?,
      ..state.clone()
    },
    Action::Users(action) => AppState {
      users: users::reduce(&state.users, action)?,
      ..state.clone()
    },
    Action::Projects(action) => AppState {
      projects: projects::reduce(&state.projects, action)?,
      ..state.clone()
    },
    Action::ApiCallFailed(error) => AppState {
      last_api_error: Some(error.clone()),
      ..state.clone()
    },
    Action::ApiRequest(_) => state.clone(),
  };

  Ok(next)
}
