//! Connection pool.
//!
//! `bb8` does the pooling: bounded lending, reuse of returned handles, and idle
//! eviction by its reaper. This module supplies the `TableService` manager and
//! adds what `bb8` lacks, namely closing the pool for good once every lent
//! connection has come back.

use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::store::{ConnectionSettings, ServiceFactory, TableService};
use bb8::{ErrorSink, ManageConnection, RunError};
use parking_lot::RwLock;
use serde::Serialize;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

const MIN_REAP_INTERVAL: Duration = Duration::from_millis(10);
/// Longest an acquire waits for a free connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Live connections, idle plus borrowed.
    pub size: usize,
    pub idle: usize,
    pub borrowed: usize,
    pub max_size: usize,
}

/// Opens `TableService` handles for `bb8`.
pub struct ServiceManager {
    factory: Arc<dyn ServiceFactory>,
    settings: ConnectionSettings,
}

impl ManageConnection for ServiceManager {
    type Connection = Arc<dyn TableService>;
    type Error = AdapterError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.factory.connect(&self.settings)?;
        log::trace!("pool: opened connection to {}", self.settings.account_name());
        Ok(conn)
    }

    // Requests are stateless; a handle stays usable until dropped.
    async fn is_valid(&self, _conn: &mut Self::Connection) -> Result<(), Self::Error> {
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
struct LogErrorSink;

impl ErrorSink<AdapterError> for LogErrorSink {
    fn sink(&self, error: AdapterError) {
        log::warn!("pool: background connect failed: {error}");
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<AdapterError>> {
        Box::new(*self)
    }
}

struct PoolInner {
    /// `None` once drained.
    pool: RwLock<Option<bb8::Pool<ServiceManager>>>,
    settings: ConnectionSettings,
    max_size: usize,
    closed: AtomicBool,
    returned: Notify,
}

impl PoolInner {
    fn borrowed(&self) -> usize {
        self.pool.read().as_ref().map_or(0, |p| {
            let state = p.state();
            state.connections.saturating_sub(state.idle_connections) as usize
        })
    }
}

/// Shared handle to one pool. Cloning is cheap and refers to the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Builds a pool from `config`. Incomplete credentials select the development
    /// store. Must run inside a tokio runtime, which hosts the idle reaper.
    ///
    /// # Errors
    /// `Config` if the configuration is invalid or no runtime is running.
    pub fn new(factory: Arc<dyn ServiceFactory>, config: &AdapterConfig) -> Result<Self, AdapterError> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|_| AdapterError::Config("connection pool needs a running tokio runtime".into()))?;
        let max_size = u32::try_from(config.max_connections)
            .map_err(|_| AdapterError::Config(format!("max_connections too large: {}", config.max_connections)))?;
        let settings = ConnectionSettings::from_config(config);
        log::info!(
            "pool: account={} max_connections={} idle_timeout_ms={}",
            settings.account_name(),
            config.max_connections,
            config.idle_timeout_ms
        );
        let idle_timeout = config.idle_timeout();
        let pool = bb8::Pool::builder()
            .max_size(max_size)
            .idle_timeout(Some(idle_timeout))
            .max_lifetime(None::<Duration>)
            .reaper_rate((idle_timeout / 2).max(MIN_REAP_INTERVAL))
            .connection_timeout(ACQUIRE_TIMEOUT)
            .retry_connection(false)
            .error_sink(Box::new(LogErrorSink))
            .build_unchecked(ServiceManager { factory, settings: settings.clone() });
        Ok(Self {
            inner: Arc::new(PoolInner {
                pool: RwLock::new(Some(pool)),
                settings,
                max_size: config.max_connections,
                closed: AtomicBool::new(false),
                returned: Notify::new(),
            }),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Lends a connection, waiting while all `max_size` are out.
    ///
    /// # Errors
    /// `PoolClosed` once draining has begun; any error from
    /// `ServiceFactory::connect`.
    pub async fn acquire(&self) -> Result<PooledConnection, AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::PoolClosed);
        }
        let pool = self.inner.pool.read().clone().ok_or(AdapterError::PoolClosed)?;
        let conn = pool.get_owned().await.map_err(|e| match e {
            RunError::User(e) => e,
            RunError::TimedOut => AdapterError::Connection("timed out waiting for a pooled connection".into()),
        })?;
        let lent = PooledConnection { conn, _signal: ReturnSignal(Arc::clone(&self.inner)) };
        if self.is_closed() {
            drop(lent);
            return Err(AdapterError::PoolClosed);
        }
        Ok(lent)
    }

    /// Returns a connection. Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Closes the pool: waits for every lent connection to come back, then
    /// destroys all of them. Acquires that were waiting, and any later ones,
    /// fail with `PoolClosed`.
    pub async fn drain_and_destroy_all(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        loop {
            let notified = self.inner.returned.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.borrowed() == 0 {
                break;
            }
            notified.await;
        }
        let destroyed = self.inner.pool.write().take().map_or(0, |p| p.state().idle_connections);
        log::info!("pool: drained, destroyed {destroyed} idle connection(s)");
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let (size, idle) = self.inner.pool.read().as_ref().map_or((0, 0), |p| {
            let state = p.state();
            (state.connections as usize, state.idle_connections as usize)
        });
        PoolStatus { size, idle, borrowed: size.saturating_sub(idle), max_size: self.inner.max_size }
    }
}

/// Wakes a pending drain after the connection ahead of it went back to `bb8`.
struct ReturnSignal(Arc<PoolInner>);

impl Drop for ReturnSignal {
    fn drop(&mut self) {
        self.0.returned.notify_waiters();
    }
}

/// A lent connection. Returned to the pool when dropped.
pub struct PooledConnection {
    // Dropped before `_signal`, so the handle is back in the pool when the
    // drain wakes up.
    conn: bb8::PooledConnection<'static, ServiceManager>,
    _signal: ReturnSignal,
}

impl Deref for PooledConnection {
    type Target = dyn TableService;

    fn deref(&self) -> &Self::Target {
        &**self.conn
    }
}
