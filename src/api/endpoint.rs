//! Per-resource endpoint configuration.

use serde_json::{Map, Value};

/// How a resource accepts edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRoute {
  /// `PUT {base}/edit/{id}` with the merged entity as body
  PutWithId,
  /// `POST {base}/edit` with the merged entity (including its id) as body
  PostWithBody,
}

/// Static description of one remote resource and its local snapshot key.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
  /// Human name used in logs and errors (e.g. "transactions")
  pub name: &'static str,
  /// Path under the API base URL (e.g. "/transactions")
  pub base_path: &'static str,
  /// Key of the persisted snapshot
  pub storage_key: &'static str,
  pub edit: EditRoute,
  pub fields: FieldMap,
}

/// Top-level field renames between the local and the remote shape.
///
/// Pairs are `(local, remote)`.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
  renames: &'static [(&'static str, &'static str)],
}

impl FieldMap {
  pub const fn new(renames: &'static [(&'static str, &'static str)]) -> Self {
    Self { renames }
  }

  /// Rewrite a locally serialized entity into the remote shape.
  pub fn to_remote(&self, value: Value) -> Value {
    self.rename(value, |(local, remote)| (local, remote))
  }

  /// Rewrite a remote payload into the local shape.
  pub fn to_local(&self, value: Value) -> Value {
    self.rename(value, |(local, remote)| (remote, local))
  }

  fn rename(
    &self,
    value: Value,
    direction: impl Fn((&'static str, &'static str)) -> (&'static str, &'static str),
  ) -> Value {
    let Value::Object(object) = value else {
      return value;
    };

    let mut out = Map::with_capacity(object.len());
    for (key, field) in object {
      let renamed = self
        .renames
        .iter()
        .map(|pair| direction(*pair))
        .find(|(from, _)| *from == key)
        .map(|(_, to)| to.to_string())
        .unwrap_or(key);
      out.insert(renamed, field);
    }
    Value::Object(out)
  }
}
