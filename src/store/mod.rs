//! Offline-tolerant synchronized collections.
//!
//! A [`SyncedCollectionStore`] keeps an ordered in-memory collection aligned
//! with:
//! - a remote resource (authoritative whenever reachable)
//! - a persisted snapshot (used when the remote is not)
//!
//! Network failures never reach the caller: mutations fall back to a local
//! change and fetches fall back to the snapshot.

mod collection;
mod error;
mod ids;
mod merge;
mod state;
mod traits;


pub use collection::SyncedCollectionStore;
pub use error::StoreError;
pub use merge::FieldChanges;
pub use state::StoreSnapshot;
pub use traits::{CommitSource, Committed, Entity, FetchSource, Remote};
