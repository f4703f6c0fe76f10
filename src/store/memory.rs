//! In-process development table store.
//!
//! Plays the part of the local storage emulator: tables of entities ordered by
//! `(PartitionKey, RowKey)`, metadata stamped on every write, atomic batches, and
//! queries served in pages of at most `page_size` rows with continuation tokens.

use crate::entity::{Entity, EntityKey, METADATA_FIELD};
use crate::errors::AdapterError;
use crate::query::{TableQuery, eval_query};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{
    Batch, BatchOperation, ConnectionSettings, ContinuationToken, QueryPage, RetryFilter,
    ServiceFactory, TableService,
};

/// Rows per page, matching what the hosted service returns per request.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
/// Account name the development store answers to.
pub const DEVELOPMENT_ACCOUNT: &str = "devstoreaccount1";

type Table = BTreeMap<EntityKey, Entity>;

pub struct MemoryTables {
    tables: RwLock<HashMap<String, Table>>,
    page_size: usize,
}

impl Default for MemoryTables {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTables {
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self { tables: RwLock::new(HashMap::new()), page_size: page_size.max(1) }
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Row count of `table`, or `None` if it does not exist.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.read().get(table).map(BTreeMap::len)
    }

    /// Stored row including its metadata attribute.
    #[must_use]
    pub fn get(&self, table: &str, key: &EntityKey) -> Option<Entity> {
        self.tables.read().get(table).and_then(|t| t.get(key).cloned())
    }

    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let mut guard = self.tables.write();
        let t = guard.get_mut(table).ok_or_else(|| table_not_found(table))?;
        f(t)
    }
}

#[async_trait]
impl TableService for MemoryTables {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, AdapterError> {
        validate_table_name(table)?;
        let mut guard = self.tables.write();
        if guard.contains_key(table) {
            return Ok(false);
        }
        guard.insert(table.to_string(), Table::new());
        log::debug!("development store: created table {table}");
        Ok(true)
    }

    async fn delete_table(&self, table: &str) -> Result<(), AdapterError> {
        self.tables.write().remove(table).map(|_| ()).ok_or_else(|| table_not_found(table))
    }

    async fn insert_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        self.with_table(table, |t| apply(t, &BatchOperation::Insert(entity.clone())))
    }

    async fn insert_or_merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        self.with_table(table, |t| apply(t, &BatchOperation::InsertOrMerge(entity.clone())))
    }

    async fn merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        self.with_table(table, |t| apply(t, &BatchOperation::Merge(entity.clone())))
    }

    async fn delete_entity(&self, table: &str, key: &EntityKey) -> Result<(), AdapterError> {
        self.with_table(table, |t| apply(t, &BatchOperation::Delete(key.clone())).map(|_| ()))
    }

    async fn commit_batch(&self, table: &str, batch: &Batch) -> Result<(), AdapterError> {
        self.with_table(table, |t| {
            // Stage on a copy so a failing operation leaves the table untouched.
            let mut staged = t.clone();
            for (i, op) in batch.operations().iter().enumerate() {
                apply(&mut staged, op).map_err(|e| match e {
                    AdapterError::Backend { status, message } => AdapterError::Backend {
                        status,
                        message: format!("batch operation {i} ({}) failed: {message}", op.kind()),
                    },
                    other => other,
                })?;
            }
            *t = staged;
            Ok(())
        })
    }

    async fn query_entities(
        &self,
        query: &TableQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QueryPage, AdapterError> {
        let guard = self.tables.read();
        let t = guard.get(&query.table).ok_or_else(|| table_not_found(&query.table))?;
        let limit = query.top.map_or(self.page_size, |n| (n as usize).min(self.page_size));
        let start = continuation.map(ContinuationToken::position);
        let range = match &start {
            Some(k) => t.range(k.clone()..),
            None => t.range::<EntityKey, _>(..),
        };
        let mut matched = range.filter(|(_, e)| eval_query(e, query));
        let entities: Vec<Entity> = matched.by_ref().take(limit).map(|(_, e)| e.clone()).collect();
        let continuation = matched.next().map(|(k, _)| ContinuationToken::at(k));
        Ok(QueryPage { entities, continuation })
    }
}

fn apply(t: &mut Table, op: &BatchOperation) -> Result<Entity, AdapterError> {
    match op {
        BatchOperation::Insert(e) => {
            let key = require_key(e)?;
            if t.contains_key(&key) {
                return Err(AdapterError::backend(409, format!("EntityAlreadyExists: {key}")));
            }
            let stored = stamp(strip(e.clone()));
            t.insert(key, stored.clone());
            Ok(stored)
        }
        BatchOperation::InsertOrMerge(e) => {
            let key = require_key(e)?;
            let merged = match t.remove(&key) {
                Some(existing) => merge(existing, e),
                None => strip(e.clone()),
            };
            let stored = stamp(merged);
            t.insert(key, stored.clone());
            Ok(stored)
        }
        BatchOperation::Merge(e) => {
            let key = require_key(e)?;
            let existing = t
                .remove(&key)
                .ok_or_else(|| AdapterError::backend(404, format!("ResourceNotFound: {key}")))?;
            let stored = stamp(merge(existing, e));
            t.insert(key, stored.clone());
            Ok(stored)
        }
        BatchOperation::Delete(key) => t
            .remove(key)
            .ok_or_else(|| AdapterError::backend(404, format!("ResourceNotFound: {key}"))),
    }
}

fn merge(mut existing: Entity, patch: &Entity) -> Entity {
    for (k, v) in patch.attributes() {
        if k != METADATA_FIELD {
            existing.insert(k, v.clone());
        }
    }
    existing
}

fn strip(mut e: Entity) -> Entity {
    e.remove(METADATA_FIELD);
    e
}

fn stamp(mut e: Entity) -> Entity {
    let now = Utc::now();
    let ts = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    let meta = json!({
        "etag": format!("W/\"datetime'{}'\"", ts.replace(':', "%3A")),
        "timestamp": ts,
    });
    e.insert(METADATA_FIELD, meta);
    e
}

fn require_key(e: &Entity) -> Result<EntityKey, AdapterError> {
    e.key().ok_or_else(|| AdapterError::backend(400, "PropertiesNeedValue: PartitionKey and RowKey are required"))
}

fn table_not_found(table: &str) -> AdapterError {
    AdapterError::backend(404, format!("TableNotFound: {table}"))
}

// Table names: 3-63 alphanumeric characters, not starting with a digit.
fn validate_table_name(table: &str) -> Result<(), AdapterError> {
    let ok = (3..=63).contains(&table.len())
        && table.chars().all(|c| c.is_ascii_alphanumeric())
        && table.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if ok {
        Ok(())
    } else {
        Err(AdapterError::backend(400, format!("InvalidResourceName: '{table}'")))
    }
}

/// Factory that serves every account from in-process stores, one per account name.
///
/// Development settings map to [`DEVELOPMENT_ACCOUNT`]. Account connections are
/// wrapped in a [`RetryFilter`] for their configured policy.
pub struct MemoryServiceFactory {
    accounts: Mutex<HashMap<String, Arc<MemoryTables>>>,
    page_size: usize,
}

impl Default for MemoryServiceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServiceFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self { accounts: Mutex::new(HashMap::new()), page_size }
    }

    /// The store behind `account`, created on first use.
    pub fn tables(&self, account: &str) -> Arc<MemoryTables> {
        self.accounts
            .lock()
            .entry(account.to_string())
            .or_insert_with(|| Arc::new(MemoryTables::with_page_size(self.page_size)))
            .clone()
    }

    #[must_use]
    pub fn development_tables(&self) -> Arc<MemoryTables> {
        self.tables(DEVELOPMENT_ACCOUNT)
    }
}

impl ServiceFactory for MemoryServiceFactory {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn TableService>, AdapterError> {
        let tables = self.tables(settings.account_name());
        let service: Arc<dyn TableService> = match settings {
            ConnectionSettings::Development => tables,
            ConnectionSettings::Account { retry_policy, .. } => {
                Arc::new(RetryFilter::new(tables, *retry_policy))
            }
        };
        Ok(service)
    }
}
