use crate::entity::{Entity, Sanitize};
use crate::errors::AdapterError;
use crate::query::TableQuery;
use crate::store::{ContinuationToken, TableService};

use super::EntitySink;

/// Walks a query page by page on one connection.
pub struct PageCursor<'a> {
    conn: &'a dyn TableService,
    query: TableQuery,
    continuation: Option<ContinuationToken>,
    remaining: Option<usize>,
    exhausted: bool,
    pages: usize,
}

impl<'a> PageCursor<'a> {
    #[must_use]
    pub fn new(conn: &'a dyn TableService, query: TableQuery) -> Self {
        let remaining = query.top.map(|n| n as usize);
        Self { conn, query, continuation: None, remaining, exhausted: false, pages: 0 }
    }

    /// Round trips made so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Fetches the next page with exactly one store round trip, or returns
    /// `None` once the result set (or the `top` cap) is exhausted. A page may be
    /// empty when the store hands back a continuation with no rows.
    ///
    /// # Errors
    /// Whatever the store returns; the cursor is then exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Entity>>, AdapterError> {
        if self.exhausted || self.remaining == Some(0) {
            self.exhausted = true;
            return Ok(None);
        }
        if let Some(left) = self.remaining {
            self.query.top = Some(u32::try_from(left).unwrap_or(u32::MAX));
        }
        let page = match self.conn.query_entities(&self.query, self.continuation.as_ref()).await {
            Ok(p) => p,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };
        self.pages += 1;
        let mut entities = page.entities;
        if let Some(left) = self.remaining.as_mut() {
            entities.truncate(*left);
            *left -= entities.len();
        }
        entities.sanitize();
        self.continuation = page.continuation;
        if self.continuation.is_none() {
            self.exhausted = true;
        }
        log::trace!(
            "cursor: table={} page={} rows={} more={}",
            self.query.table,
            self.pages,
            entities.len(),
            !self.exhausted
        );
        Ok(Some(entities))
    }
}

/// Concatenates every page in the order the store returned them.
///
/// # Errors
/// The first store error; rows already fetched are discarded.
pub async fn drain(conn: &dyn TableService, query: TableQuery) -> Result<Vec<Entity>, AdapterError> {
    let mut cursor = PageCursor::new(conn, query);
    let mut out = Vec::new();
    while let Some(page) = cursor.next_page().await? {
        out.extend(page);
    }
    Ok(out)
}

/// Writes each fetched page to `sink` as one chunk, empty ones included, then
/// ends the sink. `end`
/// is called exactly once, also when fetching or writing fails. Returns the
/// number of entities written.
///
/// # Errors
/// The first store or sink error; an `end` failure is reported if nothing failed before it.
pub async fn stream(
    conn: &dyn TableService,
    query: TableQuery,
    sink: &mut dyn EntitySink,
) -> Result<usize, AdapterError> {
    let pumped = pump(PageCursor::new(conn, query), sink).await;
    let ended = sink.end().await;
    let written = pumped?;
    ended?;
    Ok(written)
}

async fn pump(mut cursor: PageCursor<'_>, sink: &mut dyn EntitySink) -> Result<usize, AdapterError> {
    let mut written = 0;
    while let Some(page) = cursor.next_page().await? {
        written += page.len();
        sink.write(page).await?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{METADATA_FIELD, ROW_KEY};
    use crate::pagination::VecSink;
    use crate::store::MemoryTables;
    use serde_json::json;

    async fn seeded(rows: usize, page_size: usize) -> MemoryTables {
        let t = MemoryTables::with_page_size(page_size);
        t.create_table_if_not_exists("items").await.unwrap();
        for i in 0..rows {
            let mut e = Entity::with_keys("p", &format!("{i:03}"));
            e.insert("n", json!(i));
            t.insert_entity("items", &e).await.unwrap();
        }
        t
    }

    #[tokio::test]
    async fn drain_follows_continuations_in_order() {
        let t = seeded(7, 3).await;
        let rows = drain(&t, TableQuery::from_table("items")).await.unwrap();
        let keys: Vec<_> = rows.iter().map(|e| e.row_key().unwrap().to_string()).collect();
        assert_eq!(keys, ["000", "001", "002", "003", "004", "005", "006"]);
        assert!(rows.iter().all(|e| e.get(METADATA_FIELD).is_none()));
    }

    #[tokio::test]
    async fn one_round_trip_per_page() {
        let t = seeded(7, 3).await;
        let mut c = PageCursor::new(&t, TableQuery::from_table("items"));
        let mut sizes = Vec::new();
        while let Some(p) = c.next_page().await.unwrap() {
            sizes.push(p.len());
        }
        assert_eq!(sizes, [3, 3, 1]);
        assert_eq!(c.pages_fetched(), 3);
    }

    #[tokio::test]
    async fn top_caps_across_pages() {
        let t = seeded(10, 3).await;
        let mut c = PageCursor::new(&t, TableQuery::from_table("items").top(5));
        let mut total = 0;
        while let Some(p) = c.next_page().await.unwrap() {
            total += p.len();
        }
        assert_eq!(total, 5);
        assert_eq!(c.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn stream_writes_chunks_and_ends_once() {
        let t = seeded(5, 2).await;
        let mut sink = VecSink::new();
        let n = stream(&t, TableQuery::from_table("items"), &mut sink).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(sink.chunks().len(), 3);
        assert_eq!(sink.end_count(), 1);
        assert_eq!(sink.entities()[4].get(ROW_KEY), Some(&json!("004")));
    }

    #[tokio::test]
    async fn stream_of_empty_table_writes_one_empty_chunk() {
        let t = seeded(0, 4).await;
        let mut sink = VecSink::new();
        assert_eq!(stream(&t, TableQuery::from_table("items"), &mut sink).await.unwrap(), 0);
        assert_eq!(sink.chunks().len(), 1);
        assert!(sink.chunks()[0].is_empty());
        assert_eq!(sink.end_count(), 1);
    }

    #[tokio::test]
    async fn stream_ends_sink_on_store_error() {
        let t = MemoryTables::new();
        let mut sink = VecSink::new();
        let err = stream(&t, TableQuery::from_table("missing"), &mut sink).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(sink.end_count(), 1);
        assert!(sink.chunks().is_empty());
    }
}
