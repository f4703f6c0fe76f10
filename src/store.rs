//! Backing table-store interface.
//!
//! `TableService` is the surface the adapter consumes from a table-storage client:
//! table lifecycle, single-entity writes, batch commits and paged queries. One
//! service value is one pooled connection, bound to one account and one retry
//! policy. `ServiceFactory` builds them for the pool.

mod memory;
mod retry;

pub use memory::{DEFAULT_PAGE_SIZE, DEVELOPMENT_ACCOUNT, MemoryServiceFactory, MemoryTables};
pub use retry::RetryFilter;

use crate::config::{AdapterConfig, RetryPolicy};
use crate::entity::{Entity, EntityKey};
use crate::errors::AdapterError;
use crate::query::TableQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque cursor returned when a query has more pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: String,
}

impl ContinuationToken {
    #[must_use]
    pub fn at(key: &EntityKey) -> Self {
        Self { next_partition_key: key.partition_key.clone(), next_row_key: key.row_key.clone() }
    }

    /// First key the next page starts from.
    #[must_use]
    pub fn position(&self) -> EntityKey {
        EntityKey::new(&self.next_partition_key, &self.next_row_key)
    }
}

/// One round trip's worth of query results.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub entities: Vec<Entity>,
    pub continuation: Option<ContinuationToken>,
}

impl QueryPage {
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.continuation.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Insert(Entity),
    InsertOrMerge(Entity),
    Merge(Entity),
    Delete(EntityKey),
}

impl BatchOperation {
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        match self {
            Self::Insert(e) | Self::InsertOrMerge(e) | Self::Merge(e) => e.key(),
            Self::Delete(k) => Some(k.clone()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::InsertOrMerge(_) => "insert_or_merge",
            Self::Merge(_) => "merge",
            Self::Delete(_) => "delete",
        }
    }
}

/// Mutations grouped for a single commit. Operations keep caller order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    operations: Vec<BatchOperation>,
}

impl Batch {
    #[must_use]
    pub const fn begin() -> Self {
        Self { operations: Vec::new() }
    }

    pub fn push(&mut self, op: BatchOperation) {
        self.operations.push(op);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    #[must_use]
    pub fn first_key(&self) -> Option<EntityKey> {
        self.operations.first().and_then(BatchOperation::key)
    }
}

#[async_trait]
pub trait TableService: Send + Sync {
    /// Returns true if the table was created by this call.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, AdapterError>;

    async fn delete_table(&self, table: &str) -> Result<(), AdapterError>;

    /// Inserts a new entity; fails if the key already exists.
    async fn insert_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError>;

    async fn insert_or_merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError>;

    /// Merges attributes into an existing entity; fails if it does not exist.
    async fn merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError>;

    async fn delete_entity(&self, table: &str, key: &EntityKey) -> Result<(), AdapterError>;

    /// Applies every operation or none of them.
    async fn commit_batch(&self, table: &str, batch: &Batch) -> Result<(), AdapterError>;

    /// Fetches one page, starting at `continuation` when given.
    async fn query_entities(
        &self,
        query: &TableQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QueryPage, AdapterError>;
}

/// Where a connection points: the local development store or a real account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSettings {
    Development,
    Account { account: String, secret: String, retry_policy: RetryPolicy },
}

impl ConnectionSettings {
    /// Falls back to development storage whenever credentials are incomplete.
    #[must_use]
    pub fn from_config(config: &AdapterConfig) -> Self {
        match (config.account.as_deref(), config.secret.as_deref()) {
            (Some(account), Some(secret))
                if !config.development && !account.trim().is_empty() && !secret.trim().is_empty() =>
            {
                Self::Account {
                    account: account.to_string(),
                    secret: secret.to_string(),
                    retry_policy: config.retry_policy,
                }
            }
            _ => Self::Development,
        }
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        match self {
            Self::Development => DEVELOPMENT_ACCOUNT,
            Self::Account { account, .. } => account,
        }
    }

    #[must_use]
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Builds backend clients for the connection pool.
pub trait ServiceFactory: Send + Sync {
    /// # Errors
    /// Any client construction failure; the pool hands it to the acquiring caller.
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn TableService>, AdapterError>;
}
