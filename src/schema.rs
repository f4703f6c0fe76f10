//! Collection registrations and their attribute definitions.
//!
//! The table store is schemaless, so the attribute definitions a caller
//! registers are kept here and handed back by `describe`.

use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Attribute name to the caller's attribute description.
pub type CollectionDefinition = Map<String, Value>;

/// What a model layer hands over when it registers a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub identity: String,
    /// Backing table; defaults to `identity`.
    #[serde(default, rename = "tableName", alias = "table_name")]
    pub table_name: Option<String>,
    #[serde(default)]
    pub definition: CollectionDefinition,
    #[serde(default)]
    pub config: AdapterConfig,
}

impl CollectionSpec {
    #[must_use]
    pub fn new(identity: &str) -> Self {
        Self { identity: identity.to_string(), ..Self::default() }
    }

    #[must_use]
    pub fn with_table_name(mut self, table: &str) -> Self {
        self.table_name = Some(table.to_string());
        self
    }

    #[must_use]
    pub fn with_definition(mut self, definition: CollectionDefinition) -> Self {
        self.definition = definition;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        self.table_name.as_deref().filter(|t| !t.is_empty()).unwrap_or(&self.identity)
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<String, CollectionDefinition>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or replaces the definition for `name`.
    pub fn register(&self, name: &str, definition: CollectionDefinition) {
        self.entries.write().insert(name.to_string(), definition);
    }

    /// # Errors
    /// `SchemaNotFound` when nothing was registered under `name`.
    pub fn describe(&self, name: &str) -> Result<CollectionDefinition, AdapterError> {
        self.entries.read().get(name).cloned().ok_or_else(|| AdapterError::SchemaNotFound(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.entries.read().keys().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_defaults_to_identity() {
        assert_eq!(CollectionSpec::new("users").table(), "users");
        assert_eq!(CollectionSpec::new("users").with_table_name("people").table(), "people");
        assert_eq!(CollectionSpec::new("users").with_table_name("").table(), "users");
    }

    #[test]
    fn describe_returns_registered_definition() {
        let r = SchemaRegistry::new();
        assert!(matches!(r.describe("users"), Err(AdapterError::SchemaNotFound(n)) if n == "users"));
        let def = json!({"name": {"type": "string"}}).as_object().cloned().unwrap();
        r.register("users", def.clone());
        assert_eq!(r.describe("users").unwrap(), def);
        assert_eq!(r.names(), ["users"]);
    }

    #[test]
    fn spec_deserializes_from_model_json() {
        let s: CollectionSpec = serde_json::from_value(json!({
            "identity": "users",
            "tableName": "people",
            "definition": {"age": {"type": "integer"}},
            "config": {"account": "acct", "secret": "k", "retry_policy": "NoRetry"}
        }))
        .unwrap();
        assert_eq!(s.table(), "people");
        assert!(s.config.has_credentials());
        assert_eq!(s.config.max_connections, 9);
    }
}
