use crate::errors::AdapterError;
use crate::utils::json::is_truthy;
use serde_json::{Map, Value};

use super::{Entity, PARTITION_KEY, ROW_KEY};

const AUTO_INCREMENT_FLAG: &str = "autoIncrement";

/// Validates an entity before it is submitted for creation.
///
/// Both identity attributes must be non-empty strings, and no attribute may ask the
/// store for a generated, auto-incrementing value.
///
/// # Errors
/// Returns `AdapterError::Validation` describing the first problem found.
pub fn check_keys(entity: &Entity) -> Result<(), AdapterError> {
    let has_key = |name: &str| entity.get(name).and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    if !has_key(PARTITION_KEY) || !has_key(ROW_KEY) {
        return Err(AdapterError::Validation("Invalid RowKey or PartitionKey provided!".into()));
    }
    if let Some((name, _)) = entity.attributes().find(|(_, v)| requests_auto_increment(v)) {
        return Err(AdapterError::Validation(format!(
            "attribute '{name}' requests an auto-incrementing id, which the table store does not support. \
             Set autoPK to false on the collection and generate the RowKey yourself (a GUID works), \
             marking that attribute as the primary key."
        )));
    }
    Ok(())
}

/// Rejects update patches that would rewrite an entity's identity.
///
/// # Errors
/// Returns `AdapterError::Validation` if the patch sets `PartitionKey` or `RowKey`.
pub fn check_patch(patch: &Map<String, Value>) -> Result<(), AdapterError> {
    for key in [PARTITION_KEY, ROW_KEY] {
        if patch.contains_key(key) {
            return Err(AdapterError::Validation(format!(
                "update patch must not change '{key}'; destroy and re-create the entity instead"
            )));
        }
    }
    Ok(())
}

/// A fresh random RowKey for callers that have no natural row identifier.
#[must_use]
pub fn generate_row_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn requests_auto_increment(v: &Value) -> bool {
    match v {
        Value::Object(m) => m.get(AUTO_INCREMENT_FLAG).is_some_and(is_truthy),
        _ => false,
    }
}
