use std::ops::{Deref, DerefMut};

use futures_core::future::BoxFuture;

use crate::connection::{Busy, MySqlConnection};
use crate::error::{ClientError, Error, Result};
use crate::protocol::text::ComQuery;

impl MySqlConnection {
    /// Starts a transaction and returns a guard that rolls back unless
    /// committed.
    ///
    /// Transactions do not nest: beginning a second transaction on the same
    /// connection fails with [`ClientError::NestedTransaction`].
    pub async fn begin(&mut self) -> Result<Transaction<'_>> {
        if self.in_transaction {
            return Err(Error::Client(ClientError::NestedTransaction));
        }

        self.execute("START TRANSACTION").await?;

        Ok(Transaction {
            conn: self,
            open: true,
        })
    }

    /// Runs `f` inside a transaction: `COMMIT` if it returns `Ok`,
    /// `ROLLBACK` if it returns `Err` (the error is rethrown).
    pub async fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut MySqlConnection) -> BoxFuture<'c, Result<T>>,
    {
        if self.in_transaction {
            return Err(Error::Client(ClientError::NestedTransaction));
        }

        self.execute("START TRANSACTION").await?;

        match f(self).await {
            Ok(value) => {
                self.execute("COMMIT").await?;

                Ok(value)
            }

            Err(err) => {
                // a fatal error already tore the session down; nothing to
                // roll back then
                if self.connected() {
                    if let Err(rollback_err) = self.execute("ROLLBACK").await {
                        log::warn!("error rolling back transaction: {rollback_err}");
                    }
                }

                Err(err)
            }
        }
    }
}

/// An in-progress transaction.
///
/// Dropping the guard without calling [`commit`][Self::commit] queues a
/// `ROLLBACK` that is flushed before the connection's next command.
pub struct Transaction<'c> {
    conn: &'c mut MySqlConnection,
    open: bool,
}

impl Transaction<'_> {
    pub async fn commit(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute("COMMIT").await?;

        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute("ROLLBACK").await?;

        Ok(())
    }
}

impl Deref for Transaction<'_> {
    type Target = MySqlConnection;

    fn deref(&self) -> &MySqlConnection {
        self.conn
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut MySqlConnection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open && self.conn.connected() {
            // cannot await here; queue the ROLLBACK and let the next
            // command's ready-check flush and drain it
            self.conn.stream.sequence_id = 0;

            if self.conn.stream.write_packet(ComQuery("ROLLBACK")).is_ok() {
                self.conn.stream.busy = Busy::Result;
            }

            self.conn.in_transaction = false;
        }
    }
}
