mod keys;
mod sanitize;

pub use keys::{check_keys, check_patch, generate_row_key};
pub use sanitize::{Sanitize, clean};

use crate::errors::AdapterError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Attribute holding the partition identifier.
pub const PARTITION_KEY: &str = "PartitionKey";
/// Attribute holding the row identifier.
pub const ROW_KEY: &str = "RowKey";
/// Attribute the store injects into returned rows (etag, timestamp).
pub const METADATA_FIELD: &str = "_";

/// A schemaless table row: attribute name to scalar JSON value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Entity(pub Map<String, Value>);

impl Entity {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Starts an entity carrying just its two identity attributes.
    #[must_use]
    pub fn with_keys(partition_key: &str, row_key: &str) -> Self {
        let mut e = Self::new();
        e.insert(PARTITION_KEY, Value::String(partition_key.to_string()));
        e.insert(ROW_KEY, Value::String(row_key.to_string()));
        e
    }

    #[must_use]
    pub fn partition_key(&self) -> Option<&str> {
        self.0.get(PARTITION_KEY).and_then(Value::as_str)
    }

    #[must_use]
    pub fn row_key(&self) -> Option<&str> {
        self.0.get(ROW_KEY).and_then(Value::as_str)
    }

    /// The composite key, if both identifiers are present as strings.
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        Some(EntityKey::new(self.partition_key()?, self.row_key()?))
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    pub fn insert(&mut self, attribute: &str, value: Value) -> Option<Value> {
        self.0.insert(attribute.to_string(), value)
    }

    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.0.remove(attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every patch field onto the entity. Returns true if any value changed.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> bool {
        let mut changed = false;
        for (k, v) in patch {
            if self.0.insert(k.clone(), v.clone()).as_ref() != Some(v) {
                changed = true;
            }
        }
        changed
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Entity {
    type Error = AdapterError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AdapterError::Validation(format!(
                "entity must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Self::Object(e.0)
    }
}

/// The two-part address of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
}

impl EntityKey {
    #[must_use]
    pub fn new(partition_key: &str, row_key: &str) -> Self {
        Self { partition_key: partition_key.to_string(), row_key: row_key.to_string() }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionKey={} RowKey={}", self.partition_key, self.row_key)
    }
}

pub(crate) const fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
