use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use crate::common::StatementCache;
use crate::error::{ClientError, Error, Result};
use crate::options::MySqlConnectOptions;
use crate::protocol::text::{ComInitDb, ComPing, ComQuit};
use crate::statement::MySqlStatement;

mod establish;
mod executor;
mod stream;
mod tls;

pub use executor::RowStream;
pub(crate) use stream::{Busy, MySqlStream};

/// Capacity of the per-connection cache of auto-prepared statements.
pub(crate) const STATEMENT_CACHE_CAPACITY: usize = 32;

/// Where the session is in its lifecycle. Commands are accepted only in
/// `Established`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Fresh,
    AwaitInitialHandshake,
    HandshakeResponseSent,
    Established,
    AwaitingCommandResponse,
    QuitSent,
    Closed,
}

/// An asynchronous connection to a MySQL or MariaDB server.
///
/// A connection serves one command at a time; `&mut self` on every command
/// method enforces that. Server errors leave the connection usable; wire
/// errors and timeouts close it.
pub struct MySqlConnection {
    pub(crate) stream: MySqlStream,
    pub(crate) state: SessionState,
    pub(crate) cache_statement: StatementCache,
    pub(crate) in_transaction: bool,
    pub(crate) command_timeout: Option<Duration>,
    on_close: Vec<Box<dyn FnOnce() + Send>>,
}

impl Debug for MySqlConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("state", &self.state)
            .finish()
    }
}

impl MySqlConnection {
    /// Opens a connection from a `mysql://` URL and completes the handshake.
    pub async fn connect(url: &str) -> Result<Self> {
        let options: MySqlConnectOptions = url.parse()?;

        Self::connect_with(&options).await
    }

    /// Opens a connection with explicit options and completes the handshake.
    ///
    /// The whole sequence (dial, optional TLS upgrade, authentication,
    /// session setup) is bounded by [`MySqlConnectOptions::timeout`].
    pub async fn connect_with(options: &MySqlConnectOptions) -> Result<Self> {
        match tokio::time::timeout(options.timeout, Self::establish(options)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Client(ClientError::Timeout)),
        }
    }

    /// Whether the session can still serve commands.
    pub fn connected(&self) -> bool {
        matches!(
            self.state,
            SessionState::Established | SessionState::AwaitingCommandResponse
        )
    }

    /// Whether a transaction is currently open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Registers a callback to run when this connection closes, gracefully
    /// or not.
    pub fn on_close(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_close.push(Box::new(callback));
    }

    pub(crate) fn ensure_established(&self) -> Result<()> {
        match self.state {
            SessionState::Established => Ok(()),

            SessionState::QuitSent | SessionState::Closed => {
                Err(Error::Client(ClientError::ConnectionClosed))
            }

            _ => Err(Error::Client(ClientError::NotConnected)),
        }
    }

    /// Checks that the server is still answering.
    pub async fn ping(&mut self) -> Result<()> {
        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        let result = async {
            self.stream.wait_until_ready().await?;
            self.stream.send_packet(ComPing).await?;
            self.stream.recv_ok().await?;

            Ok(())
        }
        .await;

        self.finish_command(result).await
    }

    /// Changes the default database of the session.
    pub async fn use_database(&mut self, database: &str) -> Result<()> {
        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        let result = async {
            self.stream.wait_until_ready().await?;
            self.stream.send_packet(ComInitDb(database)).await?;
            self.stream.recv_ok().await?;

            Ok(())
        }
        .await;

        self.finish_command(result).await
    }

    /// Destroys a prepared statement on the server. The server sends no
    /// reply to `COM_STMT_CLOSE`.
    pub async fn deallocate(&mut self, statement: MySqlStatement) -> Result<()> {
        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        let result = async {
            self.stream.wait_until_ready().await?;
            self.stream
                .send_packet(crate::protocol::statement::StmtClose {
                    statement_id: statement.id,
                })
                .await
        }
        .await;

        self.finish_command(result).await
    }

    /// Gracefully closes the session: `COM_QUIT` is sent without waiting
    /// for a reply, then the transport shuts down.
    pub async fn close(mut self) -> Result<()> {
        if !self.connected() {
            return Ok(());
        }

        let quit = async {
            self.stream.wait_until_ready().await?;
            self.stream.send_packet(ComQuit).await
        }
        .await;

        self.state = SessionState::QuitSent;

        let shutdown = self.stream.shutdown().await;
        self.state = SessionState::Closed;
        self.cache_statement.clear();
        self.fire_on_close();

        quit.and(shutdown)
    }

    /// Tears the session down without the `COM_QUIT` courtesy. Used when
    /// the wire is no longer trustworthy.
    pub(crate) async fn force_close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        let _ = self.stream.shutdown().await;

        self.state = SessionState::Closed;
        self.cache_statement.clear();
        self.fire_on_close();
    }

    /// Applies post-command bookkeeping: fatal errors close the session,
    /// everything else returns it to `Established`.
    pub(crate) async fn finish_command<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Err(err) if err.is_fatal_to_connection() => {
                log::debug!("closing connection after fatal error: {err}");
                self.force_close().await;
            }

            _ => {
                self.state = SessionState::Established;
            }
        }

        result
    }

    fn fire_on_close(&mut self) {
        for callback in self.on_close.drain(..) {
            callback();
        }
    }
}

impl Drop for MySqlConnection {
    fn drop(&mut self) {
        // the socket closes with the handle; observers still deserve to know
        if self.state != SessionState::Closed {
            self.fire_on_close();
        }
    }
}
