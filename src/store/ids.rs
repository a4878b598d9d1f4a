//! Locally synthesized identifiers for entities created while offline.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Last id handed out in this process.
static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

/// Next local id: the current time in nanoseconds, bumped past the last id
/// issued so two calls never return the same value.
pub fn next_local_id() -> String {
  let now = Utc::now()
    .timestamp_nanos_opt()
    .and_then(|n| u64::try_from(n).ok())
    .unwrap_or(0);

  let prev = LAST_ISSUED
    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
      Some(now.max(last + 1))
    })
    .unwrap_or_else(|last| last);

  now.max(prev + 1).to_string()
}
