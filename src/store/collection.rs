//! Remote-primary, local-fallback collection store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::Endpoint;
use crate::credentials::CredentialProvider;
use crate::storage::{decode_collection, encode_collection, SnapshotStorage};

use super::error::StoreError;
use super::ids::next_local_id;
use super::merge::{merge_fields, FieldChanges};
use super::state::{StoreSnapshot, StoreState};
use super::traits::{CommitSource, Committed, Entity, FetchSource, Remote};

/// Ordered collection of `T` kept aligned with a remote resource and a
/// persisted snapshot.
///
/// Every operation tries the remote first. Network failures are absorbed by
/// applying the change locally; only logical failures (no credential, unknown
/// id, unmergeable update) are returned. After each completed operation the
/// persisted snapshot equals the in-memory collection.
pub struct SyncedCollectionStore<T: Entity> {
  endpoint: Endpoint,
  remote: Arc<dyn Remote<T>>,
  storage: Arc<dyn SnapshotStorage>,
  credentials: Arc<dyn CredentialProvider>,
  state: Mutex<StoreState<T>>,
  updates: watch::Sender<StoreSnapshot<T>>,
  /// Present when mutations must run one at a time
  gate: Option<tokio::sync::Mutex<()>>,
}

impl<T: Entity> SyncedCollectionStore<T> {
  /// Create an empty store. Call [`init`](Self::init) to hydrate from the
  /// persisted snapshot.
  pub fn new(
    endpoint: Endpoint,
    remote: Arc<dyn Remote<T>>,
    storage: Arc<dyn SnapshotStorage>,
    credentials: Arc<dyn CredentialProvider>,
  ) -> Self {
    let (updates, _) = watch::channel(StoreSnapshot::default());
    Self {
      endpoint,
      remote,
      storage,
      credentials,
      state: Mutex::new(StoreState::new()),
      updates,
      gate: None,
    }
  }

  /// Run operations on this store strictly one at a time.
  pub fn with_serialized_mutations(mut self, serialize: bool) -> Self {
    self.gate = serialize.then(|| tokio::sync::Mutex::new(()));
    self
  }

  pub fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  /// Receive a new [`StoreSnapshot`] whenever items, loading or error change.
  pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot<T>> {
    self.updates.subscribe()
  }

  pub fn snapshot(&self) -> StoreSnapshot<T> {
    self.lock_state().snapshot()
  }

  pub fn items(&self) -> Vec<T> {
    self.lock_state().items.clone()
  }

  pub fn get(&self, id: &str) -> Option<T> {
    let state = self.lock_state();
    state.items.iter().find(|e| e.id() == Some(id)).cloned()
  }

  pub fn is_loading(&self) -> bool {
    self.lock_state().in_flight > 0
  }

  pub fn error(&self) -> Option<String> {
    self.lock_state().error.clone()
  }

  /// Cold start: load the persisted snapshot without touching the remote.
  pub fn init(&self) -> FetchSource {
    match self.load_snapshot() {
      Some((items, saved_at)) => {
        debug!(resource = self.endpoint.name, count = items.len(), "hydrated from snapshot");
        self.update_state(|state| state.items = items);
        FetchSource::Snapshot { saved_at }
      }
      None => FetchSource::Empty,
    }
  }

  /// Replace the collection with the remote state, or with the persisted
  /// snapshot when the remote is unreachable.
  ///
  /// A missing credential is treated as being offline.
  pub async fn fetch(&self) -> FetchSource {
    let _turn = self.wait_turn().await;
    let op = self.begin();

    let fetched = match self.credentials.token() {
      Some(token) => match self.remote.list(&token).await {
        Ok(items) => Some(items),
        Err(e) => {
          warn!(resource = self.endpoint.name, error = %e, "remote fetch failed, using snapshot");
          None
        }
      },
      None => {
        debug!(resource = self.endpoint.name, "no credential, fetching from snapshot");
        None
      }
    };

    if let Some(items) = fetched {
      let items = authoritative(items, self.endpoint.name);
      debug!(resource = self.endpoint.name, count = items.len(), "fetched from remote");
      return match self.commit(&op, |current| {
        *current = items;
        Ok(())
      }) {
        Ok(()) => FetchSource::Remote,
        Err(_) => FetchSource::Empty,
      };
    }

    let (items, source) = match self.load_snapshot() {
      Some((items, saved_at)) => (items, FetchSource::Snapshot { saved_at }),
      None => (Vec::new(), FetchSource::Empty),
    };
    match self.restore(&op, items) {
      Ok(()) => source,
      Err(_) => FetchSource::Empty,
    }
  }

  /// Append a new entity. Any draft id is dropped before submission.
  ///
  /// When the remote is unreachable, or answers without an id or with an id
  /// already present in the collection, the entity is stored under a locally
  /// synthesized id.
  pub async fn add(
    &self,
    entity: T,
    classification: Option<&str>,
  ) -> Result<Committed<T>, StoreError> {
    let _turn = self.wait_turn().await;
    let op = self.begin();
    let result = self.add_inner(&op, entity, classification).await;
    self.record(&op, &result);
    result
  }

  async fn add_inner(
    &self,
    op: &Operation<'_, T>,
    mut draft: T,
    classification: Option<&str>,
  ) -> Result<Committed<T>, StoreError> {
    let token = self.require_token()?;
    draft.set_id(None);

    let created = match self.remote.create(&token, &draft, classification).await {
      Ok(created) if created.has_id() => Some(created),
      Ok(_) => {
        warn!(resource = self.endpoint.name, "remote created entity without id, keeping local copy");
        None
      }
      Err(e) => {
        warn!(resource = self.endpoint.name, error = %e, "remote create failed, adding locally");
        None
      }
    };

    self.commit(op, |items| {
      let committed = match created {
        Some(created) if created.id().is_some_and(|id| position(items, id).is_none()) => {
          Committed::remote(created)
        }
        other => {
          if let Some(created) = other {
            warn!(
              resource = self.endpoint.name,
              id = ?created.id(),
              "remote created entity under an id already in use, keeping local copy"
            );
          }
          draft.set_id(Some(unused_local_id(items)));
          Committed::local(draft)
        }
      };
      items.push(committed.entity.clone());
      Ok(committed)
    })
  }

  /// Overlay `changes` on the entity `id`, keeping its position.
  ///
  /// Returns whichever version (remote answer or local merge) was committed.
  pub async fn update(&self, id: &str, changes: &FieldChanges) -> Result<Committed<T>, StoreError> {
    let _turn = self.wait_turn().await;
    let op = self.begin();
    let result = self.update_inner(&op, id, changes).await;
    self.record(&op, &result);
    result
  }

  async fn update_inner(
    &self,
    op: &Operation<'_, T>,
    id: &str,
    changes: &FieldChanges,
  ) -> Result<Committed<T>, StoreError> {
    let token = self.require_token()?;
    let current = self.get(id).ok_or_else(|| self.not_found(id))?;

    let merged = merge_fields(&current, changes).map_err(|e| StoreError::InvalidUpdate {
      resource: self.endpoint.name,
      id: id.to_string(),
      reason: e.to_string(),
    })?;

    let committed = match self.remote.update(&token, id, &merged).await {
      Ok(mut updated) => {
        if updated.id() != Some(id) {
          if updated.has_id() {
            warn!(resource = self.endpoint.name, id, "remote answered with a different id, keeping ours");
          }
          updated.set_id(Some(id.to_string()));
        }
        Committed::remote(updated)
      }
      Err(e) => {
        warn!(resource = self.endpoint.name, id, error = %e, "remote update failed, updating locally");
        Committed::local(merged)
      }
    };

    self.commit(op, |items| {
      // Removed while the remote call was outstanding
      let index = position(items, id).ok_or_else(|| self.not_found(id))?;
      items[index] = committed.entity.clone();
      Ok(())
    })?;

    Ok(committed)
  }

  /// Remove the entity `id` locally whether or not the remote delete succeeds.
  pub async fn delete(&self, id: &str) -> Result<CommitSource, StoreError> {
    let _turn = self.wait_turn().await;
    let op = self.begin();
    let result = self.delete_inner(&op, id).await;
    self.record(&op, &result);
    result
  }

  async fn delete_inner(&self, op: &Operation<'_, T>, id: &str) -> Result<CommitSource, StoreError> {
    let token = self.require_token()?;
    if self.get(id).is_none() {
      return Err(self.not_found(id));
    }

    let source = match self.remote.delete(&token, id).await {
      Ok(()) => CommitSource::Remote,
      Err(e) => {
        warn!(resource = self.endpoint.name, id, error = %e, "remote delete failed, removing locally");
        CommitSource::Local
      }
    };

    self.commit(op, |items| {
      items.retain(|e| e.id() != Some(id));
      Ok(())
    })?;

    Ok(source)
  }

  /// Sign-out reset: clears the collection, the flags and the persisted
  /// snapshot for this resource.
  ///
  /// Operations still outstanding are abandoned: they stop counting as
  /// loading and their results are neither applied nor persisted.
  pub async fn cleanup(&self) {
    let _turn = self.wait_turn().await;

    let mut state = self.lock_state();
    state.items.clear();
    state.error = None;
    state.in_flight = 0;
    state.generation += 1;
    if let Err(e) = self.storage.remove(self.endpoint.storage_key) {
      warn!(resource = self.endpoint.name, error = %e, "failed to remove snapshot");
    }
    self.updates.send_replace(state.snapshot());
    debug!(resource = self.endpoint.name, generation = state.generation, "cleaned up");
  }

  fn lock_state(&self) -> MutexGuard<'_, StoreState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  async fn wait_turn(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
    match &self.gate {
      Some(gate) => Some(gate.lock().await),
      None => None,
    }
  }

  fn begin(&self) -> Operation<'_, T> {
    let mut state = self.lock_state();
    state.in_flight += 1;
    state.error = None;
    self.updates.send_replace(state.snapshot());
    Operation {
      store: self,
      generation: state.generation,
    }
  }

  fn record<R>(&self, op: &Operation<'_, T>, result: &Result<R, StoreError>) {
    let Err(e) = result else {
      return;
    };
    warn!(resource = self.endpoint.name, error = %e, "operation rejected");
    let message = e.to_string();
    self.update_state(|state| {
      if state.generation == op.generation {
        state.error = Some(message);
      }
    });
  }

  fn update_state(&self, f: impl FnOnce(&mut StoreState<T>)) {
    let mut state = self.lock_state();
    f(&mut state);
    self.updates.send_replace(state.snapshot());
  }

  /// Apply `mutate` to the current collection and, if it succeeds, persist
  /// the result before releasing the lock.
  fn commit<R>(
    &self,
    op: &Operation<'_, T>,
    mutate: impl FnOnce(&mut Vec<T>) -> Result<R, StoreError>,
  ) -> Result<R, StoreError> {
    let mut state = self.lock_state();
    self.ensure_current(&state, op)?;
    let outcome = mutate(&mut state.items)?;
    self.persist(&state.items);
    self.updates.send_replace(state.snapshot());
    Ok(outcome)
  }

  /// Replace the collection with data that already matches storage.
  fn restore(&self, op: &Operation<'_, T>, items: Vec<T>) -> Result<(), StoreError> {
    let mut state = self.lock_state();
    self.ensure_current(&state, op)?;
    state.items = items;
    self.updates.send_replace(state.snapshot());
    Ok(())
  }

  fn ensure_current(&self, state: &StoreState<T>, op: &Operation<'_, T>) -> Result<(), StoreError> {
    if state.generation == op.generation {
      return Ok(());
    }
    debug!(resource = self.endpoint.name, "store cleaned up meanwhile, discarding result");
    Err(StoreError::Cancelled {
      resource: self.endpoint.name,
    })
  }

  fn persist(&self, items: &[T]) {
    let written = encode_collection(items)
      .and_then(|payload| self.storage.write(self.endpoint.storage_key, &payload));
    if let Err(e) = written {
      warn!(resource = self.endpoint.name, error = %e, "failed to persist snapshot");
    }
  }

  fn load_snapshot(&self) -> Option<(Vec<T>, chrono::DateTime<chrono::Utc>)> {
    let stored = match self.storage.read(self.endpoint.storage_key) {
      Ok(stored) => stored?,
      Err(e) => {
        warn!(resource = self.endpoint.name, error = %e, "failed to read snapshot");
        return None;
      }
    };

    match decode_collection::<T>(&stored.payload) {
      Ok(items) => Some((authoritative(items, self.endpoint.name), stored.saved_at)),
      Err(e) => {
        warn!(resource = self.endpoint.name, error = %e, "unreadable snapshot ignored");
        None
      }
    }
  }

  fn require_token(&self) -> Result<String, StoreError> {
    self.credentials.token().ok_or(StoreError::MissingCredential {
      resource: self.endpoint.name,
    })
  }

  fn not_found(&self, id: &str) -> StoreError {
    StoreError::NotFound {
      resource: self.endpoint.name,
      id: id.to_string(),
    }
  }
}

/// Marks one outstanding operation; loading ends when the last one drops.
struct Operation<'a, T: Entity> {
  store: &'a SyncedCollectionStore<T>,
  generation: u64,
}

impl<T: Entity> Drop for Operation<'_, T> {
  fn drop(&mut self) {
    let generation = self.generation;
    self.store.update_state(|state| {
      // Cleanup already stopped counting operations from older generations
      if state.generation == generation {
        state.in_flight = state.in_flight.saturating_sub(1);
      }
    });
  }
}

fn position<T: Entity>(items: &[T], id: &str) -> Option<usize> {
  items.iter().position(|e| e.id() == Some(id))
}

/// A fresh local id not yet used in `items`.
fn unused_local_id<T: Entity>(items: &[T]) -> String {
  let mut id = next_local_id();
  while position(items, &id).is_some() {
    id = next_local_id();
  }
  id
}

/// Drop entities without an id and later duplicates of an id.
fn authoritative<T: Entity>(items: Vec<T>, resource: &str) -> Vec<T> {
  let mut seen = HashSet::new();
  let total = items.len();

  let kept: Vec<T> = items
    .into_iter()
    .filter(|e| match e.id() {
      Some(id) if !id.is_empty() => seen.insert(id.to_string()),
      _ => false,
    })
    .collect();

  if kept.len() != total {
    warn!(resource, dropped = total - kept.len(), "dropped entities without a unique id");
  }
  kept
}
