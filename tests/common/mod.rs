//! Shared fixtures: an in-memory adapter whose connections are wrapped in a
//! service that counts store calls and can fail selected batch commits.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tableshim::entity::EntityKey;
use tableshim::query::TableQuery;
use tableshim::store::{Batch, ContinuationToken, QueryPage};
use tableshim::{
    Adapter, AdapterConfig, AdapterError, CollectionSpec, ConnectionSettings, Entity, MemoryServiceFactory,
    MemoryTables, ServiceFactory, TableService,
};

#[derive(Default)]
pub struct StoreStats {
    pub connects: AtomicUsize,
    pub calls: AtomicUsize,
    pub commits: AtomicUsize,
    /// Batches whose first RowKey is listed here fail with a 400.
    pub fail_commits_starting_at: Mutex<Vec<String>>,
    /// When set, every query resuming from a continuation token fails with a 503.
    pub fail_continued_queries: AtomicBool,
}

impl StoreStats {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_batch_starting_at(&self, row_key: &str) {
        self.fail_commits_starting_at.lock().push(row_key.to_string());
    }
}

pub struct CountingService {
    inner: Arc<dyn TableService>,
    stats: Arc<StoreStats>,
}

impl CountingService {
    fn hit(&self) {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TableService for CountingService {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, AdapterError> {
        self.hit();
        self.inner.create_table_if_not_exists(table).await
    }

    async fn delete_table(&self, table: &str) -> Result<(), AdapterError> {
        self.hit();
        self.inner.delete_table(table).await
    }

    async fn insert_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        self.hit();
        self.inner.insert_entity(table, entity).await
    }

    async fn insert_or_merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        self.hit();
        self.inner.insert_or_merge_entity(table, entity).await
    }

    async fn merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        self.hit();
        self.inner.merge_entity(table, entity).await
    }

    async fn delete_entity(&self, table: &str, key: &EntityKey) -> Result<(), AdapterError> {
        self.hit();
        self.inner.delete_entity(table, key).await
    }

    async fn commit_batch(&self, table: &str, batch: &Batch) -> Result<(), AdapterError> {
        self.hit();
        self.stats.commits.fetch_add(1, Ordering::SeqCst);
        if let Some(first) = batch.first_key()
            && self.stats.fail_commits_starting_at.lock().contains(&first.row_key)
        {
            return Err(AdapterError::backend(400, format!("InvalidInput: batch starting at {first}")));
        }
        self.inner.commit_batch(table, batch).await
    }

    async fn query_entities(
        &self,
        query: &TableQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QueryPage, AdapterError> {
        self.hit();
        if continuation.is_some() && self.stats.fail_continued_queries.load(Ordering::SeqCst) {
            return Err(AdapterError::backend(503, "ServerBusy"));
        }
        self.inner.query_entities(query, continuation).await
    }
}

pub struct CountingFactory {
    pub inner: MemoryServiceFactory,
    pub stats: Arc<StoreStats>,
}

impl ServiceFactory for CountingFactory {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn TableService>, AdapterError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.connect(settings)?;
        Ok(Arc::new(CountingService { inner, stats: Arc::clone(&self.stats) }))
    }
}

pub struct Fixture {
    pub adapter: Adapter,
    pub stats: Arc<StoreStats>,
    pub tables: Arc<MemoryTables>,
}

pub fn dev_config() -> AdapterConfig {
    AdapterConfig { development: true, ..AdapterConfig::default() }
}

/// Adapter with a registered `users` collection on a development store paging
/// `page_size` rows at a time.
pub async fn fixture(page_size: usize) -> Fixture {
    fixture_with(page_size, dev_config()).await
}

pub async fn fixture_with(page_size: usize, config: AdapterConfig) -> Fixture {
    let stats = Arc::new(StoreStats::default());
    let inner = MemoryServiceFactory::with_page_size(page_size);
    let tables = inner.development_tables();
    let factory = Arc::new(CountingFactory { inner, stats: Arc::clone(&stats) });
    let adapter = Adapter::new(factory);
    adapter
        .register_collection(CollectionSpec::new("users").with_config(config))
        .await
        .expect("register users");
    Fixture { adapter, stats, tables }
}

pub fn user(rk: usize, age: i64) -> Value {
    json!({"PartitionKey": "users", "RowKey": format!("{rk:04}"), "age": age, "name": format!("user{rk}")})
}

pub async fn seed_users(f: &Fixture, n: usize) {
    let rows: Vec<Value> = (0..n).map(|i| user(i, 20 + (i as i64 % 50))).collect();
    f.adapter.create_each("users", &Value::Array(rows)).await.expect("seed users");
}
