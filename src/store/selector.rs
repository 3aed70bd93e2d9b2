//! Memoized derived views over store state.
//!
//! Slices live behind `Arc`, and reducers only replace the `Arc` of a slice
//! they change, so pointer identity tells whether an input changed.

use std::sync::Arc;

/// Cheap "same input" check used to reuse a cached result.
pub trait Identity: Clone {
  fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Arc<T> {
  fn same(&self, other: &Self) -> bool {
    Arc::ptr_eq(self, other)
  }
}

impl<A: Identity, B: Identity> Identity for (A, B) {
  fn same(&self, other: &Self) -> bool {
    self.0.same(&other.0) && self.1.same(&other.1)
  }
}

type Compute<I, O> = Box<dyn Fn(&I) -> O + Send + Sync>;

/// Caches the last output and recomputes only when the input changes identity.
pub struct Memo<I, O> {
  compute: Compute<I, O>,
  cached: Option<(I, O)>,
  recomputations: usize,
}

impl<I: Identity, O: Clone> Memo<I, O> {
  pub fn new(compute: impl Fn(&I) -> O + Send + Sync + 'static) -> Self {
    Self {
      compute: Box::new(compute),
      cached: None,
      recomputations: 0,
    }
  }

  pub fn select(&mut self, input: I) -> O {
    if let Some((last, output)) = &self.cached {
      if last.same(&input) {
        return output.clone();
      }
    }

    let output = (self.compute)(&input);
    self.recomputations += 1;
    self.cached = Some((input, output.clone()));
    output
  }

  /// How many times the output was actually computed.
  pub fn recomputations(&self) -> usize {
    self.recomputations
  }
}
