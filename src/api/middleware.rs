//! Request orchestration for `Action::ApiRequest` envelopes.

use std::sync::Arc;
use tracing::{info, warn};

use super::transport::Transport;
use crate::clock::Clock;
use crate::store::{Action, Effects, Middleware};

/// Performs the fetch described by an envelope and reports the outcome as
/// lifecycle actions.
///
/// For every envelope exactly one start action is dispatched before the
/// envelope is forwarded, followed later by exactly one success or error
/// action. Failures never escape as errors; they become actions.
/// Everything else passes through untouched.
pub struct ApiMiddleware {
  transport: Arc<dyn Transport>,
  clock: Arc<dyn Clock>,
}

impl ApiMiddleware {
  pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
    Self { transport, clock }
  }
}

impl Middleware for ApiMiddleware {
  fn handle(&self, action: Action, effects: &mut Effects) -> Option<Action> {
    let request = match action {
      Action::ApiRequest(request) => request,
      other => return Some(other),
    };

    let lifecycle = request.lifecycle;
    effects.dispatch((lifecycle.on_start)());

    let transport_request = request.transport_request();
    let url = transport_request.url.clone();
    info!(%url, method = %transport_request.method, "api request began");

    let response = self.transport.fetch(transport_request);
    let clock = Arc::clone(&self.clock);

    effects.spawn(Box::pin(async move {
      let outcome = match response.await {
        Ok(body) => (lifecycle.on_success)(body, clock.now()).map_err(Into::into),
        Err(e) => Err(e),
      };

      match outcome {
        Ok(action) => {
          info!(%url, "api request succeeded");
          action
        }
        Err(e) => {
          warn!(%url, error = %e, "api request failed");
          lifecycle.error_action(e)
        }
      }
    }));

    Some(Action::ApiRequest(request))
  }
}
