use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use futures_core::future::BoxFuture;

use crate::connection::MySqlConnection;
use crate::error::{Error, Result};
use crate::options::MySqlConnectOptions;
use crate::pool::MySqlPool;

/// Predicate deciding whether an error from a pooled callback warrants
/// another attempt.
pub type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Callback run on every freshly opened pooled connection.
pub type OnConnectionOpen =
    Arc<dyn for<'c> Fn(&'c mut MySqlConnection) -> BoxFuture<'c, Result<()>> + Send + Sync>;

/// Retry policy for [`MySqlPool::with_connection`] and
/// [`MySqlPool::transactional`].
///
/// Without a predicate, only transport errors and timeouts are retried;
/// server and client errors are assumed deterministic.
#[derive(Clone)]
pub struct RetryOptions {
    pub(crate) max_attempts: u32,
    pub(crate) delay: Duration,
    pub(crate) retry_if: Option<RetryPredicate>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::from_millis(50),
            retry_if: None,
        }
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of attempts, including the first. `1` disables retry.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Base delay between attempts; attempt `n` waits `delay × n`.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the default retry eligibility check.
    pub fn retry_if(mut self, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.retry_if = Some(Arc::new(predicate));
        self
    }
}

impl Debug for RetryOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("retry_if", &self.retry_if.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Configuration for a [`MySqlPool`].
#[derive(Clone)]
pub struct MySqlPoolOptions {
    pub(crate) max_connections: u32,
    pub(crate) idle_test_threshold: Duration,
    pub(crate) max_connection_age: Duration,
    pub(crate) max_session_use: Duration,
    pub(crate) max_error_count: u32,
    pub(crate) time_zone: Option<String>,
    pub(crate) retry: RetryOptions,
    pub(crate) on_connection_open: Option<OnConnectionOpen>,
}

impl Default for MySqlPoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_test_threshold: Duration::from_secs(60),
            max_connection_age: Duration::from_secs(12 * 60 * 60),
            max_session_use: Duration::from_secs(8 * 60 * 60),
            max_error_count: 64,
            time_zone: None,
            retry: RetryOptions::default(),
            on_connection_open: None,
        }
    }
}

impl MySqlPoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on open plus in-flight connections. Defaults to 10.
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Idle time after which a connection is health-checked with `SELECT 1`
    /// before being handed out. Defaults to 60 seconds.
    pub fn idle_test_threshold(mut self, threshold: Duration) -> Self {
        self.idle_test_threshold = threshold;
        self
    }

    /// Connections older than this are recycled. Defaults to 12 hours.
    pub fn max_connection_age(mut self, age: Duration) -> Self {
        self.max_connection_age = age;
        self
    }

    /// Connections that have accumulated this much busy time are recycled.
    /// Defaults to 8 hours.
    pub fn max_session_use(mut self, usage: Duration) -> Self {
        self.max_session_use = usage;
        self
    }

    /// Connections whose callbacks have failed this many times are
    /// recycled. Defaults to 64.
    pub fn max_error_count(mut self, count: u32) -> Self {
        self.max_error_count = count;
        self
    }

    /// Sets `time_zone` on every new pooled connection.
    pub fn time_zone(mut self, time_zone: &str) -> Self {
        self.time_zone = Some(time_zone.to_owned());
        self
    }

    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a callback run on every new pooled connection, after the
    /// handshake and session setup.
    pub fn on_connection_open(
        mut self,
        callback: impl for<'c> Fn(&'c mut MySqlConnection) -> BoxFuture<'c, Result<()>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_connection_open = Some(Arc::new(callback));
        self
    }

    /// Creates a pool for the given `mysql://` URL. Connections open lazily.
    pub fn connect(self, url: &str) -> Result<MySqlPool> {
        Ok(self.connect_with(url.parse()?))
    }

    /// Creates a pool with explicit connection options. Connections open
    /// lazily.
    pub fn connect_with(self, options: MySqlConnectOptions) -> MySqlPool {
        MySqlPool::new(options, self)
    }
}

impl Debug for MySqlPoolOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlPoolOptions")
            .field("max_connections", &self.max_connections)
            .field("idle_test_threshold", &self.idle_test_threshold)
            .field("max_connection_age", &self.max_connection_age)
            .field("max_session_use", &self.max_session_use)
            .field("max_error_count", &self.max_error_count)
            .field("time_zone", &self.time_zone)
            .field("retry", &self.retry)
            .finish()
    }
}
