use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::connection::MySqlConnection;
use crate::error::Result;
use crate::options::MySqlConnectOptions;
use crate::params::Params;
use crate::query_result::QueryResults;
use crate::statement::MySqlStatement;

mod connection;
mod inner;
mod options;

pub use connection::PooledConnection;
pub use inner::PoolStatus;
pub use options::{MySqlPoolOptions, OnConnectionOpen, RetryOptions};

use inner::SharedPool;

/// A bounded pool of MySQL connections shared across concurrent callers.
///
/// Cloning is cheap; every clone drives the same pool.
#[derive(Clone)]
pub struct MySqlPool(Arc<SharedPool>);

impl MySqlPool {
    /// Creates a pool with default [`MySqlPoolOptions`] for the given
    /// `mysql://` URL. Connections open lazily.
    pub fn connect(url: &str) -> Result<Self> {
        MySqlPoolOptions::new().connect(url)
    }

    /// Creates a pool with default [`MySqlPoolOptions`] and explicit
    /// connection options.
    pub fn connect_with(options: MySqlConnectOptions) -> Self {
        MySqlPoolOptions::new().connect_with(options)
    }

    pub(crate) fn new(connect_options: MySqlConnectOptions, options: MySqlPoolOptions) -> Self {
        Self(SharedPool::new(connect_options, options))
    }

    /// Borrows a connection, opening one if the pool is under its limit;
    /// waits cooperatively when saturated.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        self.0.acquire().await
    }

    /// Runs one statement on a pooled connection.
    pub async fn execute(&self, sql: &str) -> Result<QueryResults> {
        self.execute_with(sql, Params::None).await
    }

    /// Runs one statement with parameters on a pooled connection.
    pub async fn execute_with(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<QueryResults> {
        let mut conn = self.acquire().await?;

        match conn.execute_with(sql, params).await {
            Ok(results) => Ok(results),

            Err(err) => {
                conn.mark_error();
                Err(err)
            }
        }
    }

    /// Prepares a statement on a pooled connection; the connection stays
    /// borrowed for the statement's lifetime.
    pub async fn prepare(&self, sql: &str) -> Result<PooledStatement> {
        let mut conn = self.acquire().await?;

        match conn.prepare(sql).await {
            Ok(statement) => Ok(PooledStatement { conn, statement }),

            Err(err) => {
                conn.mark_error();
                Err(err)
            }
        }
    }

    /// Runs `f` with a borrowed connection, retrying per the pool's
    /// [`RetryOptions`]. Each retry borrows afresh, so it may run on a
    /// different session.
    pub async fn with_connection<T, F>(&self, mut f: F) -> Result<T>
    where
        F: for<'c> FnMut(&'c mut MySqlConnection) -> BoxFuture<'c, Result<T>>,
    {
        let mut attempt: u32 = 1;

        loop {
            let mut conn = self.acquire().await?;

            match f(&mut conn).await {
                Ok(value) => return Ok(value),

                Err(err) => {
                    conn.mark_error();
                    drop(conn);

                    if !self.retry_permitted(attempt, &err) {
                        return Err(err);
                    }

                    log::debug!("retrying after error (attempt {attempt}): {err}");
                    tokio::time::sleep(self.0.options.retry.delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Runs `f` inside a transaction on a borrowed connection, with the
    /// same retry policy as [`with_connection`][Self::with_connection].
    pub async fn transactional<T, F>(&self, mut f: F) -> Result<T>
    where
        F: for<'c> FnMut(&'c mut MySqlConnection) -> BoxFuture<'c, Result<T>>,
    {
        let mut attempt: u32 = 1;

        loop {
            let mut conn = self.acquire().await?;

            match conn.transactional(|c| f(c)).await {
                Ok(value) => return Ok(value),

                Err(err) => {
                    conn.mark_error();
                    drop(conn);

                    if !self.retry_permitted(attempt, &err) {
                        return Err(err);
                    }

                    log::debug!("retrying transaction after error (attempt {attempt}): {err}");
                    tokio::time::sleep(self.0.options.retry.delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    fn retry_permitted(&self, attempt: u32, err: &crate::error::Error) -> bool {
        let retry = &self.0.options.retry;

        attempt < retry.max_attempts
            && match &retry.retry_if {
                Some(predicate) => predicate(err),
                None => err.is_transport() || err.is_timeout(),
            }
    }

    pub fn status(&self) -> PoolStatus {
        self.0.status()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Closes every idle connection and blocks new acquisitions. Borrowed
    /// connections close as their holders release them.
    pub async fn close(&self) {
        self.0.close().await;
    }
}

/// A prepared statement bound to a pooled connection.
pub struct PooledStatement {
    conn: PooledConnection,
    statement: MySqlStatement,
}

impl PooledStatement {
    pub fn statement(&self) -> &MySqlStatement {
        &self.statement
    }

    /// Executes the statement with positional parameters.
    pub async fn execute(&mut self, params: impl Into<Params>) -> Result<QueryResults> {
        let statement = self.statement.clone();

        match self.conn.execute_prepared(&statement, params).await {
            Ok(results) => Ok(results),

            Err(err) => {
                self.conn.mark_error();
                Err(err)
            }
        }
    }

    /// Destroys the statement and releases its connection to the pool.
    pub async fn deallocate(mut self) -> Result<()> {
        let statement = self.statement.clone();

        self.conn.deallocate(statement).await
    }
}
