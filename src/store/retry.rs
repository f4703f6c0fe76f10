use crate::config::RetryPolicy;
use crate::entity::{Entity, EntityKey};
use crate::errors::AdapterError;
use crate::query::TableQuery;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Batch, ContinuationToken, QueryPage, TableService};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Wraps a connection and retries transient backend failures per its policy.
pub struct RetryFilter {
    inner: Arc<dyn TableService>,
    policy: RetryPolicy,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryFilter {
    #[must_use]
    pub fn new(inner: Arc<dyn TableService>, policy: RetryPolicy) -> Self {
        Self { inner, policy, max_retries: DEFAULT_MAX_RETRIES, base_delay: DEFAULT_BASE_DELAY }
    }

    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Back-off before retry number `attempt` (0-based), or `None` to give up.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        match self.policy {
            RetryPolicy::NoRetry => None,
            RetryPolicy::Linear => Some(self.base_delay),
            RetryPolicy::Exponential => Some(self.base_delay.saturating_mul(1u32 << attempt.min(16))),
        }
    }

    async fn run<T, F, Fut>(&self, op: &str, f: F) -> Result<T, AdapterError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, AdapterError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Err(e) if e.is_transient() => match self.delay_for(attempt) {
                    Some(delay) => {
                        log::debug!("{op}: transient failure ({e}); retry {} in {delay:?}", attempt + 1);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }
}

#[async_trait]
impl TableService for RetryFilter {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, AdapterError> {
        let inner = &*self.inner;
        self.run("create_table", move || inner.create_table_if_not_exists(table)).await
    }

    async fn delete_table(&self, table: &str) -> Result<(), AdapterError> {
        let inner = &*self.inner;
        self.run("delete_table", move || inner.delete_table(table)).await
    }

    async fn insert_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        let inner = &*self.inner;
        self.run("insert_entity", move || inner.insert_entity(table, entity)).await
    }

    async fn insert_or_merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        let inner = &*self.inner;
        self.run("insert_or_merge_entity", move || inner.insert_or_merge_entity(table, entity)).await
    }

    async fn merge_entity(&self, table: &str, entity: &Entity) -> Result<Entity, AdapterError> {
        let inner = &*self.inner;
        self.run("merge_entity", move || inner.merge_entity(table, entity)).await
    }

    async fn delete_entity(&self, table: &str, key: &EntityKey) -> Result<(), AdapterError> {
        let inner = &*self.inner;
        self.run("delete_entity", move || inner.delete_entity(table, key)).await
    }

    async fn commit_batch(&self, table: &str, batch: &Batch) -> Result<(), AdapterError> {
        let inner = &*self.inner;
        self.run("commit_batch", move || inner.commit_batch(table, batch)).await
    }

    async fn query_entities(
        &self,
        query: &TableQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QueryPage, AdapterError> {
        let inner = &*self.inner;
        self.run("query_entities", move || inner.query_entities(query, continuation)).await
    }
}
