use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::connection::MySqlConnection;
use crate::error::{Error, Result};
use crate::options::MySqlConnectOptions;
use crate::placeholders::quote_literal;
use crate::pool::connection::PooledConnection;
use crate::pool::options::MySqlPoolOptions;
use crate::value::Value;

// Cooperative wait between acquisition attempts while the pool is saturated.
const ACQUIRE_WAIT: Duration = Duration::from_millis(10);

/// Usage bookkeeping carried by every pooled connection, idle or borrowed.
#[derive(Debug, Clone)]
pub(crate) struct EntryMeta {
    pub(crate) opened_at: Instant,
    pub(crate) last_used_at: Instant,
    pub(crate) total_usage: Duration,
    pub(crate) error_count: u32,
}

impl EntryMeta {
    fn new() -> Self {
        let now = Instant::now();

        Self {
            opened_at: now,
            last_used_at: now,
            total_usage: Duration::ZERO,
            error_count: 0,
        }
    }
}

pub(crate) struct IdleEntry {
    conn: MySqlConnection,
    meta: EntryMeta,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<IdleEntry>,
    active: u32,
    pending: u32,
}

/// A snapshot of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections sitting in the pool, ready to be borrowed.
    pub idle: usize,

    /// Connections currently borrowed by callers.
    pub active: u32,

    /// Connection attempts in flight.
    pub pending: u32,

    /// The configured ceiling on `idle + active + pending`.
    pub max_connections: u32,
}

enum Acquired {
    Idle(IdleEntry),
    Connect,
    Wait,
}

pub(crate) struct SharedPool {
    pub(crate) connect_options: MySqlConnectOptions,
    pub(crate) options: MySqlPoolOptions,
    state: Mutex<PoolState>,
    closed: AtomicBool,
}

impl SharedPool {
    pub(crate) fn new(connect_options: MySqlConnectOptions, options: MySqlPoolOptions) -> Arc<Self> {
        Arc::new(Self {
            connect_options,
            options,
            state: Mutex::new(PoolState::default()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let state = self.state.lock().unwrap();

        PoolStatus {
            idle: state.idle.len(),
            active: state.active,
            pending: state.pending,
            max_connections: self.options.max_connections,
        }
    }

    /// Borrows a connection: the head idle entry if it validates, a new
    /// connection if the pool has room, or a cooperative wait otherwise.
    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        loop {
            if self.is_closed() {
                return Err(Error::PoolClosed);
            }

            let action = {
                let mut state = self.state.lock().unwrap();

                if let Some(entry) = state.idle.pop_front() {
                    state.active += 1;
                    Acquired::Idle(entry)
                } else if state.idle.len() as u32 + state.active + state.pending
                    < self.options.max_connections
                {
                    state.pending += 1;
                    Acquired::Connect
                } else {
                    Acquired::Wait
                }
            };

            match action {
                Acquired::Idle(mut entry) => {
                    if self.should_recycle(&entry.meta) {
                        self.discard(entry.conn);
                        continue;
                    }

                    if entry.meta.last_used_at.elapsed() >= self.options.idle_test_threshold {
                        if let Err(err) = entry.conn.execute("SELECT 1").await {
                            log::info!("idle test failed; retiring connection: {err}");
                            self.discard(entry.conn);
                            continue;
                        }
                    }

                    return Ok(PooledConnection::new(Arc::clone(self), entry.conn, entry.meta));
                }

                Acquired::Connect => {
                    let result = self.open_connection().await;

                    let mut state = self.state.lock().unwrap();
                    state.pending -= 1;

                    match result {
                        Ok(conn) => {
                            state.active += 1;
                            drop(state);

                            return Ok(PooledConnection::new(
                                Arc::clone(self),
                                conn,
                                EntryMeta::new(),
                            ));
                        }

                        Err(err) => return Err(err),
                    }
                }

                Acquired::Wait => tokio::time::sleep(ACQUIRE_WAIT).await,
            }
        }
    }

    async fn open_connection(&self) -> Result<MySqlConnection> {
        let mut conn = MySqlConnection::connect_with(&self.connect_options).await?;

        if let Some(time_zone) = &self.options.time_zone {
            conn.execute(&format!(
                "SET time_zone = {}",
                quote_literal(&Value::Text(time_zone.clone()))
            ))
            .await?;
        }

        if let Some(callback) = &self.options.on_connection_open {
            callback(&mut conn).await?;
        }

        Ok(conn)
    }

    pub(crate) fn should_recycle(&self, meta: &EntryMeta) -> bool {
        meta.opened_at.elapsed() >= self.options.max_connection_age
            || meta.total_usage >= self.options.max_session_use
            || meta.error_count >= self.options.max_error_count
    }

    /// Returns a borrowed connection to the pool, applying the usage
    /// accounting and the recycling policy.
    pub(crate) fn release(
        &self,
        conn: MySqlConnection,
        mut meta: EntryMeta,
        borrowed_at: Instant,
        had_error: bool,
    ) {
        if had_error {
            meta.error_count += 1;
        }

        meta.total_usage += borrowed_at.elapsed();
        meta.last_used_at = Instant::now();

        let mut state = self.state.lock().unwrap();
        state.active -= 1;

        if self.is_closed() || !conn.connected() || self.should_recycle(&meta) {
            drop(state);
            spawn_close(conn);
        } else {
            state.idle.push_back(IdleEntry { conn, meta });
        }
    }

    /// Retires an active entry without returning it to the idle list.
    fn discard(&self, conn: MySqlConnection) {
        {
            let mut state = self.state.lock().unwrap();
            state.active -= 1;
        }

        spawn_close(conn);
    }

    /// Closes every idle connection and blocks new acquisitions. Borrowed
    /// connections close as they are released.
    pub(crate) async fn close(&self) {
        self.closed.store(true, Ordering::Release);

        loop {
            let entry = self.state.lock().unwrap().idle.pop_front();

            match entry {
                Some(entry) => {
                    if let Err(err) = entry.conn.close().await {
                        log::warn!("error closing pooled connection during shutdown: {err}");
                    }
                }

                None => break,
            }
        }
    }
}

// Graceful close is async; from sync release paths it runs as a detached
// task. Close errors are logged and otherwise ignored.
fn spawn_close(conn: MySqlConnection) {
    if !conn.connected() {
        return;
    }

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            if let Err(err) = conn.close().await {
                log::warn!("error closing retired connection: {err}");
            }
        });
    }
}
