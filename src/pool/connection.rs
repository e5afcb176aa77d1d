use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use crate::connection::MySqlConnection;
use crate::pool::inner::{EntryMeta, SharedPool};

/// A connection borrowed from a [`MySqlPool`][crate::MySqlPool].
///
/// Dereferences to [`MySqlConnection`]; dropping it returns the connection
/// to the pool (or retires it, per the recycling policy).
pub struct PooledConnection {
    conn: Option<MySqlConnection>,
    meta: EntryMeta,
    borrowed_at: Instant,
    had_error: bool,
    pool: Arc<SharedPool>,
}

const DEREF_ERR: &str = "connection already released to the pool";

impl PooledConnection {
    pub(crate) fn new(pool: Arc<SharedPool>, conn: MySqlConnection, meta: EntryMeta) -> Self {
        Self {
            conn: Some(conn),
            meta,
            borrowed_at: Instant::now(),
            had_error: false,
            pool,
        }
    }

    /// Counts an error against this connection for the recycling policy.
    pub fn mark_error(&mut self) {
        self.had_error = true;
    }
}

impl Deref for PooledConnection {
    type Target = MySqlConnection;

    fn deref(&self) -> &MySqlConnection {
        self.conn.as_ref().expect(DEREF_ERR)
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut MySqlConnection {
        self.conn.as_mut().expect(DEREF_ERR)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .release(conn, self.meta.clone(), self.borrowed_at, self.had_error);
        }
    }
}
