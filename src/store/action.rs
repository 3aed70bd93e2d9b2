use crate::api::{ApiError, ApiRequest};

use super::entities::bugs::BugAction;
use super::entities::projects::ProjectAction;
use super::entities::users::UserAction;

/// Everything that can be dispatched to the store.
#[derive(Debug, Clone)]
pub enum Action {
  Bugs(BugAction),
  Users(UserAction),
  Projects(ProjectAction),
  /// Fetch envelope, intercepted by `ApiMiddleware`
  ApiRequest(ApiRequest),
  /// Failure of a request whose envelope has no error action of its own
  ApiCallFailed(ApiError),
}

impl Action {
  /// Stable name used in logs and the action history.
  pub fn type_name(&self) -> &'static str {
    match self {
      Action::Bugs(action) => action.type_name(),
      Action::Users(action) => action.type_name(),
      Action::Projects(action) => action.type_name(),
      Action::ApiRequest(_) => "api/callBegan",
      Action::ApiCallFailed(_) => "api/callFailed",
    }
  }
}
