//! Generic state of one cached entity collection.
//!
//! All transitions take `&self` and build a new value; the previous state is
//! never touched.

use crate::api::ApiError;
use crate::cache::FetchStatus;
use crate::clock::Timestamp;

/// Records stored in a resource collection.
pub trait Entity: Clone {
  fn id(&self) -> u64;
}

/// Monotonic id source owned by a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
  next: u64,
}

impl Default for IdAllocator {
  fn default() -> Self {
    Self { next: 1 }
  }
}

impl IdAllocator {
  /// The id the next allocation will return.
  pub fn peek(&self) -> u64 {
    self.next
  }

  /// Hand out the next id, or `None` once the id space is used up.
  pub fn allocate(&self) -> Option<(u64, Self)> {
    let next = self.next.checked_add(1)?;
    Some((self.next, Self { next }))
  }

  /// Skip over ids that are already taken.
  pub fn advance_past(&self, taken: u64) -> Self {
    Self {
      next: self.next.max(taken.saturating_add(1)),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStatus<T> {
  pub items: Vec<T>,
  /// True strictly between a request's start and its outcome
  pub loading: bool,
  /// Completion time of the last successful fetch
  pub last_fetch: Option<Timestamp>,
  /// Outcome of the last failed fetch, cleared by the next start or success
  pub last_error: Option<ApiError>,
  pub ids: IdAllocator,
}

impl<T> Default for ResourceStatus<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      loading: false,
      last_fetch: None,
      last_error: None,
      ids: IdAllocator::default(),
    }
  }
}

impl<T: Entity> ResourceStatus<T> {
  pub fn fetch_status(&self) -> FetchStatus {
    FetchStatus {
      last_fetch: self.last_fetch,
      loading: self.loading,
    }
  }

  pub fn find(&self, id: u64) -> Option<&T> {
    self.items.iter().find(|item| item.id() == id)
  }

  pub fn began(&self) -> Self {
    Self {
      items: self.items.clone(),
      loading: true,
      last_fetch: self.last_fetch,
      last_error: None,
      ids: self.ids,
    }
  }

  pub fn succeeded(&self, items: Vec<T>, fetched_at: Timestamp) -> Self {
    let highest = items.iter().map(Entity::id).max().unwrap_or(0);
    Self {
      items,
      loading: false,
      last_fetch: Some(fetched_at),
      last_error: None,
      ids: self.ids.advance_past(highest),
    }
  }

  /// Items and `last_fetch` survive a failed refresh.
  pub fn failed(&self, error: ApiError) -> Self {
    Self {
      items: self.items.clone(),
      loading: false,
      last_fetch: self.last_fetch,
      last_error: Some(error),
      ids: self.ids,
    }
  }

  /// Append a record built from a freshly allocated id, or `None` when no
  /// id is left.
  pub fn with_added(&self, build: impl FnOnce(u64) -> T) -> Option<Self> {
    let (id, ids) = self.ids.allocate()?;
    let mut items = self.items.clone();
    items.push(build(id));

    Some(Self {
      items,
      loading: self.loading,
      last_fetch: self.last_fetch,
      last_error: self.last_error.clone(),
      ids,
    })
  }

  /// Apply `update` to the record with `id`, or `None` if there is none.
  pub fn with_updated(&self, id: u64, update: impl FnOnce(&mut T)) -> Option<Self> {
    let ix = self.items.iter().position(|item| item.id() == id)?;
    let mut items = self.items.clone();
    update(&mut items[ix]);

    Some(Self {
      items,
      loading: self.loading,
      last_fetch: self.last_fetch,
      last_error: self.last_error.clone(),
      ids: self.ids,
    })
  }
}
