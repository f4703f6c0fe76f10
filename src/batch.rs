//! Multi-row mutations grouped into store batches.
//!
//! `create_each`, `update` and `destroy` each commit one batch on one pooled
//! connection: the store applies it entirely or not at all. `update_stream`
//! trades that for throughput, committing every result page as its own batch
//! while the next page is still being read.

use crate::entity::{Entity, EntityKey, Sanitize, check_keys, check_patch};
use crate::errors::AdapterError;
use crate::pagination::{PageCursor, drain};
use crate::pool::ConnectionPool;
use crate::query::{TableQuery, ensure_supported, translate};
use crate::store::{Batch, BatchOperation};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Upserts every entity in one batch. Nothing is sent unless all entities
/// pass key validation; an empty input returns without touching the pool.
///
/// # Errors
/// `Validation` for the first invalid entity; pool or commit errors otherwise.
pub async fn create_each(
    pool: &ConnectionPool,
    table: &str,
    entities: Vec<Entity>,
) -> Result<Vec<Entity>, AdapterError> {
    if entities.is_empty() {
        return Ok(Vec::new());
    }
    for e in &entities {
        check_keys(e)?;
    }
    let mut batch = Batch::begin();
    for e in &entities {
        batch.push(BatchOperation::InsertOrMerge(e.clone()));
    }
    let conn = pool.acquire().await?;
    conn.commit_batch(table, &batch).await?;
    log::debug!("create_each: table={table} rows={}", batch.len());
    let mut created = entities;
    created.sanitize();
    Ok(created)
}

/// Applies `patch` to every entity matching `options` and merges them back in
/// one batch. Returns the patched entities.
///
/// # Errors
/// `Unsupported`, `Query` or `Validation` before any store call; find or commit
/// errors otherwise.
pub async fn update(
    pool: &ConnectionPool,
    table: &str,
    options: &Map<String, Value>,
    patch: &Map<String, Value>,
) -> Result<Vec<Entity>, AdapterError> {
    ensure_supported("update", options)?;
    check_patch(patch)?;
    let query = translate(TableQuery::from_table(table), options)?;
    let conn = pool.acquire().await?;
    let mut found = drain(&*conn, query).await?;
    if found.is_empty() {
        return Ok(found);
    }
    let mut batch = Batch::begin();
    for e in &mut found {
        e.apply_patch(patch);
        batch.push(BatchOperation::Merge(e.clone()));
    }
    conn.commit_batch(table, &batch).await?;
    log::debug!("update: table={table} rows={}", batch.len());
    Ok(found)
}

/// Deletes every entity matching `options` in one batch and returns them.
///
/// # Errors
/// `Unsupported` or `Query` before any store call; find or commit errors otherwise.
pub async fn destroy(
    pool: &ConnectionPool,
    table: &str,
    options: &Map<String, Value>,
) -> Result<Vec<Entity>, AdapterError> {
    ensure_supported("destroy", options)?;
    let query = translate(TableQuery::from_table(table), options)?;
    let conn = pool.acquire().await?;
    let found = drain(&*conn, query).await?;
    if found.is_empty() {
        return Ok(found);
    }
    let mut batch = Batch::begin();
    for e in &found {
        let key = e
            .key()
            .ok_or_else(|| AdapterError::Validation("matched entity has no PartitionKey/RowKey".into()))?;
        batch.push(BatchOperation::Delete(key));
    }
    conn.commit_batch(table, &batch).await?;
    log::debug!("destroy: table={table} rows={}", batch.len());
    Ok(found)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedBatch {
    /// Key of the first entity in the page, to locate it for a retry.
    pub first_key: Option<EntityKey>,
    pub rows: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateStreamReport {
    pub updated: Vec<Entity>,
    pub committed_batches: usize,
    pub failed_batches: Vec<FailedBatch>,
}

impl UpdateStreamReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// In-flight page commits plus an end-of-input flag; settled when both say so.
#[derive(Default)]
struct BatchTracker {
    in_flight: AtomicUsize,
    ended: AtomicBool,
    settled: Notify,
}

impl BatchTracker {
    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    fn end_input(&self) {
        self.ended.store(true, Ordering::SeqCst);
        self.wake_if_settled();
    }

    fn is_settled(&self) -> bool {
        self.ended.load(Ordering::SeqCst) && self.in_flight.load(Ordering::SeqCst) == 0
    }

    fn wake_if_settled(&self) {
        if self.is_settled() {
            self.settled.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one page commit as finished when dropped, panics included.
struct InFlight(Arc<BatchTracker>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.wake_if_settled();
    }
}

/// Patches matching entities page by page, committing each page as an
/// independent batch on its own connection. A failed page is logged and
/// recorded in the report; the remaining pages still go through.
///
/// # Errors
/// `Unsupported`, `Query` or `Validation` before any store call, or a read error
/// while paging, raised after in-flight commits have settled and logged with
/// the number of rows already committed.
pub async fn update_stream(
    pool: &ConnectionPool,
    table: &str,
    options: &Map<String, Value>,
    patch: &Map<String, Value>,
) -> Result<UpdateStreamReport, AdapterError> {
    ensure_supported("updateStream", options)?;
    check_patch(patch)?;
    let query = translate(TableQuery::from_table(table), options)?;
    let tracker = Arc::new(BatchTracker::default());
    let report = Arc::new(Mutex::new(UpdateStreamReport::default()));
    let patch = Arc::new(patch.clone());

    let reader = pool.acquire().await?;
    let mut cursor = PageCursor::new(&*reader, query);
    let read_result = loop {
        match cursor.next_page().await {
            Ok(Some(page)) if page.is_empty() => {}
            Ok(Some(page)) => {
                let guard = tracker.begin();
                let pool = pool.clone();
                let table = table.to_string();
                let patch = Arc::clone(&patch);
                let report = Arc::clone(&report);
                tokio::spawn(async move {
                    let _guard = guard;
                    commit_page(&pool, &table, page, &patch, &report).await;
                });
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    drop(cursor);
    drop(reader);
    tracker.end_input();
    tracker.wait().await;
    let report = std::mem::take(&mut *report.lock());
    if let Err(e) = read_result {
        crate::notice!(
            "Reading records to update failed after {} record(s) in {} batch(es) were already committed ({e})",
            report.updated.len(),
            report.committed_batches
        );
        return Err(e);
    }

    log::debug!(
        "update_stream: table={table} updated={} failed_batches={}",
        report.updated.len(),
        report.failed_batches.len()
    );
    Ok(report)
}

async fn commit_page(
    pool: &ConnectionPool,
    table: &str,
    mut page: Vec<Entity>,
    patch: &Map<String, Value>,
    report: &Mutex<UpdateStreamReport>,
) {
    let mut batch = Batch::begin();
    for e in &mut page {
        e.apply_patch(patch);
        batch.push(BatchOperation::Merge(e.clone()));
    }
    let result = match pool.acquire().await {
        Ok(conn) => conn.commit_batch(table, &batch).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            let mut report = report.lock();
            report.committed_batches += 1;
            report.updated.extend(page);
        }
        Err(e) => {
            let first_key = batch.first_key();
            match &first_key {
                Some(k) => crate::notice!(
                    "There was an error updating a batch of records. The starting RowKey and PartitionKey are: {} {} ({e})",
                    k.row_key,
                    k.partition_key
                ),
                None => crate::notice!("There was an error updating a batch of records ({e})"),
            }
            report.lock().failed_batches.push(FailedBatch { first_key, rows: page.len(), error: e.to_string() });
        }
    }
}
