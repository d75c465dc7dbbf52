use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::foundation::error::{MontageError, MontageResult};

/// Overlay the keys of `patch` onto the serialized form of `current` and deserialize the result.
///
/// Keys unknown to `T` and `null` values are ignored, so absent optional keys keep their
/// current values. A patch that is not an object, or a key whose value does not fit its field,
/// fails with [`MontageError::InvalidJson`] naming `context`.
pub(crate) fn apply_partial<T>(current: &T, patch: &serde_json::Value, context: &str) -> MontageResult<T>
where
    T: Serialize + DeserializeOwned,
{
    let serde_json::Value::Object(patch) = patch else {
        return Err(MontageError::invalid_json(context, "expected a JSON object"));
    };
    let mut merged = serde_json::to_value(current)
        .map_err(|e| MontageError::invalid_json(context, e.to_string()))?;
    if let serde_json::Value::Object(fields) = &mut merged {
        for (key, value) in patch {
            if value.is_null() {
                continue;
            }
            if let Some(slot) = fields.get_mut(key) {
                *slot = value.clone();
            }
        }
    }
    serde_json::from_value(merged).map_err(|e| MontageError::invalid_json(context, e.to_string()))
}

/// Insert every key of `extra` into `root` when both are objects.
pub(crate) fn merge_object(root: &mut serde_json::Value, extra: serde_json::Value) {
    if let (serde_json::Value::Object(root), serde_json::Value::Object(extra)) = (root, extra) {
        root.extend(extra);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/json.rs"]
mod tests;
