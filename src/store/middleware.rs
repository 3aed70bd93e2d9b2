//! Middleware pipeline stages run before the root reducer.

use futures::future::BoxFuture;
use tracing::debug;

use super::action::Action;

/// Asynchronous work whose result re-enters the store as an action.
pub type Task = BoxFuture<'static, Action>;

/// Side effects requested by a middleware stage.
#[derive(Default)]
pub struct Effects {
  immediate: Vec<Action>,
  tasks: Vec<Task>,
}

impl Effects {
  /// Dispatch `action` before the current `dispatch` call returns.
  pub fn dispatch(&mut self, action: Action) {
    self.immediate.push(action);
  }

  /// Run `task` on the runtime and dispatch its result when it completes.
  pub fn spawn(&mut self, task: Task) {
    self.tasks.push(task);
  }

  pub fn is_empty(&self) -> bool {
    self.immediate.is_empty() && self.tasks.is_empty()
  }

  pub fn into_parts(self) -> (Vec<Action>, Vec<Task>) {
    (self.immediate, self.tasks)
  }
}

pub trait Middleware: Send + Sync {
  /// Return the action to forward to the next stage, or `None` to swallow it.
  fn handle(&self, action: Action, effects: &mut Effects) -> Option<Action>;
}

/// Logs every action passing through the pipeline.
pub struct Logger;

impl Middleware for Logger {
  fn handle(&self, action: Action, _effects: &mut Effects) -> Option<Action> {
    debug!(action = action.type_name(), "dispatch");
    Some(action)
  }
}
