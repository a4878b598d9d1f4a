/// Read-only view of a store, published to subscribers on every change.
#[derive(Debug, Clone)]
pub struct StoreSnapshot<T> {
  pub items: Vec<T>,
  /// True while at least one operation is outstanding
  pub loading: bool,
  /// Message of the last logical failure, cleared when an operation starts
  pub error: Option<String>,
}

impl<T> Default for StoreSnapshot<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      loading: false,
      error: None,
    }
  }
}

/// Mutable state behind the store's lock.
#[derive(Debug)]
pub(super) struct StoreState<T> {
  pub items: Vec<T>,
  pub in_flight: usize,
  pub error: Option<String>,
  /// Bumped by cleanup; operations begun under an older value are discarded
  pub generation: u64,
}

impl<T: Clone> StoreState<T> {
  pub fn new() -> Self {
    Self {
      items: Vec::new(),
      in_flight: 0,
      error: None,
      generation: 0,
    }
  }

  pub fn snapshot(&self) -> StoreSnapshot<T> {
    StoreSnapshot {
      items: self.items.clone(),
      loading: self.in_flight > 0,
      error: self.error.clone(),
    }
  }
}
