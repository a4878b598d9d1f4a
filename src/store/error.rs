use thiserror::Error;

/// Logical failures surfaced to the caller.
///
/// Network and storage problems never show up here; they are absorbed by the
/// local fallback path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("{resource}: not signed in, no credential available")]
  MissingCredential { resource: &'static str },

  #[error("{resource}: no entity with id {id}")]
  NotFound { resource: &'static str, id: String },

  #[error("{resource}: update for {id} does not produce a valid entity: {reason}")]
  InvalidUpdate {
    resource: &'static str,
    id: String,
    reason: String,
  },

  #[error("{resource}: store was cleaned up while the operation was outstanding")]
  Cancelled { resource: &'static str },
}
