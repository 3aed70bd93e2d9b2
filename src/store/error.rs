use thiserror::Error;

use crate::config::Verb;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  /// A mutation referenced an id that is not in the collection
  #[error("{resource} #{id} not found")]
  NotFound { resource: &'static str, id: u64 },
  /// The endpoint registry has no route for the resource
  #[error("no {verb:?} route configured for {resource}")]
  MissingRoute { resource: &'static str, verb: Verb },
  /// The slice's id allocator has no id left to hand out
  #[error("no ids left for new {resource}")]
  IdsExhausted { resource: &'static str },
  /// The store that owned this handle is gone
  #[error("store is closed")]
  Closed,
}
