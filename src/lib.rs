//! tableshim: an ORM-style CRUD and query adapter over a partitioned,
//! schemaless table store.
//!
//! Callers go through [`Adapter`]: register collections, then create, find,
//! update, destroy and stream entities. Query options are translated into the
//! store's filter language, result pages are drained or streamed, and multi-row
//! mutations are committed as batches over pooled connections.

pub mod adapter;
pub mod batch;
pub mod cli;
pub mod config;
pub mod entity;
pub mod errors;
pub mod logger;
pub mod pagination;
pub mod pool;
pub mod query;
pub mod schema;
pub mod store;
pub mod utils;

pub use adapter::Adapter;
pub use batch::{FailedBatch, UpdateStreamReport};
pub use config::{AdapterConfig, RetryPolicy};
pub use entity::{Entity, EntityKey};
pub use errors::{AdapterError, Result};
pub use pagination::{ChannelSink, EntitySink, NdjsonSink, VecSink};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use schema::{CollectionDefinition, CollectionSpec};
pub use store::{ConnectionSettings, MemoryServiceFactory, MemoryTables, ServiceFactory, TableService};
