//! Caller-facing adapter.
//!
//! `Adapter` is what a model layer talks to: it owns the collection schema
//! registry and, once the first collection registers, the connection pool. Every
//! operation borrows one pooled connection for its whole duration and returns it
//! on every exit path.

use crate::batch::{self, UpdateStreamReport};
use crate::entity::{Entity, check_keys, clean};
use crate::errors::AdapterError;
use crate::pagination::{self, EntitySink};
use crate::pool::{ConnectionPool, PoolStatus};
use crate::query::{TableQuery, ensure_supported, translate};
use crate::schema::{CollectionDefinition, CollectionSpec, SchemaRegistry};
use crate::store::{MemoryServiceFactory, ServiceFactory};
use crate::utils::json::object_or_empty;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct Adapter {
    factory: Arc<dyn ServiceFactory>,
    pool: OnceCell<ConnectionPool>,
    schema: SchemaRegistry,
}

impl Adapter {
    #[must_use]
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory, pool: OnceCell::new(), schema: SchemaRegistry::new() }
    }

    /// Adapter backed entirely by in-process development stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryServiceFactory::new()))
    }

    fn pool(&self) -> Result<&ConnectionPool, AdapterError> {
        self.pool.get().ok_or(AdapterError::NotInitialized)
    }

    /// Registers a collection and ensures its table exists. The first
    /// registration creates the pool from the collection's configuration; later
    /// ones reuse it. Returns the table name.
    ///
    /// # Errors
    /// `Config` for an invalid configuration; pool or store errors from `define`.
    pub async fn register_collection(&self, spec: CollectionSpec) -> Result<String, AdapterError> {
        if !spec.config.development && !spec.config.has_credentials() {
            crate::notice!(
                "Invalid storage authentication info provided for '{}'. Using local development storage instead.",
                spec.identity
            );
        }
        self.pool
            .get_or_try_init(|| async { ConnectionPool::new(Arc::clone(&self.factory), &spec.config) })
            .await?;
        self.schema.register(&spec.identity, spec.definition.clone());
        let table = spec.table().to_string();
        self.define(&table, spec.definition).await
    }

    /// Drains the pool and destroys every connection. Operations afterwards
    /// fail with `PoolClosed`. A never-initialized adapter tears down trivially.
    pub async fn teardown(&self) -> Result<(), AdapterError> {
        if let Some(pool) = self.pool.get() {
            pool.drain_and_destroy_all().await;
        }
        Ok(())
    }

    /// Creates the table if missing and records its definition.
    ///
    /// # Errors
    /// `NotInitialized`, pool or store errors.
    pub async fn define(&self, table: &str, definition: CollectionDefinition) -> Result<String, AdapterError> {
        let conn = self.pool()?.acquire().await?;
        let created = conn.create_table_if_not_exists(table).await?;
        self.schema.register(table, definition);
        log::info!("define: table={table} created={created}");
        Ok(table.to_string())
    }

    /// The attribute definition registered for `name`.
    ///
    /// # Errors
    /// `SchemaNotFound` if `name` was never registered or defined.
    pub fn describe(&self, name: &str) -> Result<CollectionDefinition, AdapterError> {
        self.schema.describe(name)
    }

    /// Deletes the backing table. The registered definition is kept.
    ///
    /// # Errors
    /// `NotInitialized`, pool or store errors.
    pub async fn drop(&self, table: &str) -> Result<String, AdapterError> {
        let conn = self.pool()?.acquire().await?;
        conn.delete_table(table).await?;
        log::info!("drop: table={table}");
        Ok(table.to_string())
    }

    /// Inserts one entity; fails if its key already exists.
    ///
    /// # Errors
    /// `Validation` before any store call; pool or store errors otherwise.
    pub async fn create(&self, table: &str, values: &Value) -> Result<Entity, AdapterError> {
        let entity = Entity::try_from(values.clone())?;
        check_keys(&entity)?;
        let conn = self.pool()?.acquire().await?;
        let stored = conn.insert_entity(table, &entity).await?;
        Ok(clean(stored))
    }

    /// Upserts one entity or an array of them in a single batch.
    ///
    /// # Errors
    /// `Validation` for a non-object entry or invalid keys; pool or commit errors.
    pub async fn create_each(&self, table: &str, values: &Value) -> Result<Vec<Entity>, AdapterError> {
        let entities = match values {
            Value::Array(items) => items.iter().cloned().map(Entity::try_from).collect::<Result<Vec<_>, _>>()?,
            Value::Null => Vec::new(),
            single => vec![Entity::try_from(single.clone())?],
        };
        if entities.is_empty() {
            return Ok(entities);
        }
        batch::create_each(self.pool()?, table, entities).await
    }

    /// Every entity matching `options`, across all pages, metadata stripped.
    ///
    /// # Errors
    /// `Unsupported` or `Query` before any store call; pool or store errors.
    pub async fn find(&self, table: &str, options: &Value) -> Result<Vec<Entity>, AdapterError> {
        let query = self.prepare("find", table, options)?;
        let conn = self.pool()?.acquire().await?;
        pagination::drain(&*conn, query).await
    }

    /// # Errors
    /// See [`batch::update`].
    pub async fn update(&self, table: &str, options: &Value, patch: &Value) -> Result<Vec<Entity>, AdapterError> {
        let options = object_or_empty(options, "options")?;
        let patch = object_or_empty(patch, "patch")?;
        batch::update(self.pool()?, table, &options, &patch).await
    }

    /// # Errors
    /// See [`batch::update_stream`].
    pub async fn update_stream(
        &self,
        table: &str,
        options: &Value,
        patch: &Value,
    ) -> Result<UpdateStreamReport, AdapterError> {
        let options = object_or_empty(options, "options")?;
        let patch = object_or_empty(patch, "patch")?;
        batch::update_stream(self.pool()?, table, &options, &patch).await
    }

    /// # Errors
    /// See [`batch::destroy`].
    pub async fn destroy(&self, table: &str, options: &Value) -> Result<Vec<Entity>, AdapterError> {
        let options = object_or_empty(options, "options")?;
        batch::destroy(self.pool()?, table, &options).await
    }

    /// Pushes matching entities to `sink` page by page. The sink is ended exactly
    /// once whatever happens, including when the options are rejected.
    ///
    /// # Errors
    /// `Unsupported` or `Query` (sink already ended), pool, store or sink errors.
    pub async fn stream(&self, table: &str, options: &Value, sink: &mut dyn EntitySink) -> Result<usize, AdapterError> {
        let prepared = match self.prepare("stream", table, options) {
            Ok(q) => match self.pool() {
                Ok(pool) => pool.acquire().await.map(|conn| (q, conn)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        match prepared {
            Ok((query, conn)) => pagination::stream(&*conn, query, sink).await,
            Err(e) => {
                sink.end().await?;
                Err(e)
            }
        }
    }

    /// # Errors
    /// `NotInitialized` before the first registration.
    pub fn pool_status(&self) -> Result<PoolStatus, AdapterError> {
        Ok(self.pool()?.status())
    }

    fn prepare(&self, operation: &str, table: &str, options: &Value) -> Result<TableQuery, AdapterError> {
        let options = object_or_empty(options, "options")?;
        ensure_supported(operation, &options)?;
        translate(TableQuery::from_table(table), &options)
    }
}
