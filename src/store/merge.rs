use serde_json::{Map, Value};

use super::traits::Entity;

/// Partial field changes for an update, keyed by local field name.
pub type FieldChanges = Map<String, Value>;

/// Overlay `changes` on `current`. The `id` field is never changed.
pub fn merge_fields<T: Entity>(current: &T, changes: &FieldChanges) -> Result<T, serde_json::Error> {
  let mut value = serde_json::to_value(current)?;

  if let Value::Object(fields) = &mut value {
    for (key, field) in changes {
      if key == "id" {
        continue;
      }
      fields.insert(key.clone(), field.clone());
    }
  }

  let mut merged: T = serde_json::from_value(value)?;
  merged.set_id(current.id().map(String::from));
  Ok(merged)
}
