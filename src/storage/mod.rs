//! Durable key-value storage for collection snapshots.
//!
//! Each collection is persisted under a single string key as a JSON array of
//! the full collection. Snapshots are overwritten wholesale and read wholesale;
//! there is no per-entity storage.

#[cfg(test)]
mod memory;
mod sqlite;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};

#[cfg(test)]
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// A persisted snapshot as read back from storage.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
  /// Serialized collection (JSON array)
  pub payload: String,
  /// When the snapshot was written
  pub saved_at: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
///
/// Implementations must replace a key's value atomically: a reader sees either
/// the previous payload or the new one, never a mix.
pub trait SnapshotStorage: Send + Sync {
  /// Replace the snapshot stored under `key`.
  fn write(&self, key: &str, payload: &str) -> Result<()>;

  /// Read the snapshot stored under `key`, if any.
  fn read(&self, key: &str) -> Result<Option<StoredSnapshot>>;

  /// Remove the snapshot stored under `key`. Missing keys are not an error.
  fn remove(&self, key: &str) -> Result<()>;
}

/// Serialize a full collection into a snapshot payload.
pub fn encode_collection<T: Serialize>(items: &[T]) -> Result<String> {
  serde_json::to_string(items).map_err(|e| eyre!("Failed to serialize collection: {}", e))
}

/// Deserialize a snapshot payload back into a collection.
pub fn decode_collection<T: DeserializeOwned>(payload: &str) -> Result<Vec<T>> {
  serde_json::from_str(payload).map_err(|e| eyre!("Failed to deserialize collection: {}", e))
}
