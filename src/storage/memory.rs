use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{SnapshotStorage, StoredSnapshot};

/// In-memory storage with switchable write failures.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, String>>,
  fail_writes: AtomicBool,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  /// Raw payload under `key`, bypassing the trait.
  pub fn payload(&self, key: &str) -> Option<String> {
    self.entries.lock().unwrap().get(key).cloned()
  }
}

impl SnapshotStorage for MemoryStorage {
  fn write(&self, key: &str, payload: &str) -> Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(eyre!("disk full"));
    }
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(key.to_string(), payload.to_string());
    Ok(())
  }

  fn read(&self, key: &str) -> Result<Option<StoredSnapshot>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).map(|payload| StoredSnapshot {
      payload: payload.clone(),
      saved_at: Utc::now(),
    }))
  }

  fn remove(&self, key: &str) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .remove(key);
    Ok(())
  }
}
