//! Core traits and result types for synchronized collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};

/// A domain record kept in a synchronized collection.
///
/// The identifier is optional until the record has been persisted once,
/// either by the remote or by a locally synthesized id.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  fn id(&self) -> Option<&str>;

  fn set_id(&mut self, id: Option<String>);

  /// True when the entity carries a non-empty id.
  fn has_id(&self) -> bool {
    self.id().is_some_and(|id| !id.is_empty())
  }
}

/// Remote source for one entity type.
///
/// Every failure (unreachable host, non-2xx, timeout, undecodable payload) is
/// an error; the store decides how to degrade.
#[async_trait]
pub trait Remote<T: Entity>: Send + Sync {
  /// Fetch the full collection.
  async fn list(&self, token: &str) -> Result<Vec<T>>;

  /// Create an entity. `classification` is forwarded untouched.
  async fn create(&self, token: &str, entity: &T, classification: Option<&str>) -> Result<T>;

  /// Replace the entity `id` with `entity`.
  async fn update(&self, token: &str, id: &str, entity: &T) -> Result<T>;

  /// Delete the entity `id`.
  async fn delete(&self, token: &str, id: &str) -> Result<()>;
}

/// Where the collection came from after a fetch or cold start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  /// Fresh data from the remote
  Remote,
  /// Remote unavailable, serving the persisted snapshot
  Snapshot { saved_at: DateTime<Utc> },
  /// Remote unavailable and nothing persisted
  Empty,
}

/// Which path committed a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitSource {
  /// Remote confirmed the change
  Remote,
  /// Remote failed, change applied locally only
  Local,
}

/// Value committed to the collection by add or update.
#[derive(Debug, Clone)]
pub struct Committed<T> {
  pub entity: T,
  pub source: CommitSource,
}

impl<T> Committed<T> {
  pub fn remote(entity: T) -> Self {
    Self {
      entity,
      source: CommitSource::Remote,
    }
  }

  pub fn local(entity: T) -> Self {
    Self {
      entity,
      source: CommitSource::Local,
    }
  }
}
