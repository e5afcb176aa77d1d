//! Error and Result types.

use std::fmt::{self, Display, Formatter};
use std::io;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A generic error that represents all the ways a method can fail inside of myrtle.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error communicating with the server over the socket.
    #[error("error communicating with the server: {0}")]
    Io(#[from] io::Error),

    /// An error occurred during the TLS upgrade.
    #[error("error during TLS upgrade: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Connection URL was malformed.
    #[error("error parsing connection URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Caller misuse or an environmental problem on the client side.
    ///
    /// The connection (if any) is left in a well-defined state; see the
    /// individual [`ClientError`] variants.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A deviation from the expected wire shape.
    ///
    /// Always fatal to the session: the connection force-closes itself and
    /// further operations fail with [`ClientError::ConnectionClosed`].
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An error returned by the server.
    ///
    /// Non-fatal: the connection returns to its ready state and may serve
    /// further commands.
    #[error("error returned from the server: {0}")]
    Server(#[from] MySqlDatabaseError),

    /// Column was not found by name in a row.
    #[error("no column found with the name {0:?}")]
    ColumnNotFound(Box<str>),

    /// Column index was out of bounds (e.g., asking for column 4 in a 2-column row).
    #[error("column index out of bounds: there are {len} columns but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// [`MySqlPool::close`][crate::MySqlPool::close] was called while we were
    /// waiting in [`MySqlPool::acquire`][crate::MySqlPool::acquire].
    #[error("attempted to acquire a connection on a closed pool")]
    PoolClosed,
}

impl Error {
    pub(crate) fn tls(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Tls(err.into())
    }

    /// Returns `true` if this error originated in the transport layer
    /// (socket I/O or TLS) rather than in either peer's protocol logic.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Tls(_))
    }

    /// Returns `true` if this error is a command or acquisition timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Client(ClientError::Timeout))
    }

    // Errors that leave the session unusable. The connection force-closes
    // itself when a command fails with one of these.
    pub(crate) fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Tls(_) | Error::Protocol(_) | Error::Client(ClientError::Timeout)
        )
    }
}

/// Caller misuse or an environmental problem local to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The connection has been closed; no further commands may be issued on it.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The connection has not completed its handshake.
    #[error("connection has not been established")]
    NotConnected,

    /// `transaction` was called while a transaction was already in progress
    /// on the same connection.
    #[error("a transaction is already in progress on this connection")]
    NestedTransaction,

    /// A prepared statement was executed with the wrong number of parameters.
    #[error("statement expects {expected} parameters but {given} were given")]
    ArityMismatch { expected: usize, given: usize },

    /// A parameter value has no binary-protocol representation.
    #[error("unsupported parameter type: {0}")]
    UnsupportedParamType(&'static str),

    /// The SQL referenced a named parameter the caller did not supply.
    #[error("no value supplied for named parameter :{0}")]
    UnknownParameter(String),

    /// The command did not complete within the configured timeout.
    ///
    /// The session force-closes; a late server response must not be allowed
    /// to corrupt the next command on the same socket.
    #[error("command timed out")]
    Timeout,

    /// The server requested an authentication plugin this client does not implement.
    #[error("server requested unsupported authentication plugin: {0:?}")]
    UnsupportedAuthPlugin(String),

    /// TLS was requested but the server did not advertise `CLIENT_SSL`.
    #[error("TLS was requested but the server does not support it")]
    TlsUnsupported,

    /// The server asked for a cleartext password over an unsecured transport.
    #[error("refusing cleartext authentication over an insecure transport")]
    InsecureAuth,

    /// The encoded command payload cannot be framed in a single packet.
    #[error("payload of {0} bytes exceeds the maximum packet size")]
    PacketTooLarge(usize),
}

/// A deviation from the expected wire shape.
#[derive(Debug)]
pub struct ProtocolError(pub(crate) Box<str>);

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ProtocolError {}

/// An error returned from the server, carrying the MySQL error code
/// and human-readable message from the ERR packet.
#[derive(Debug, Clone)]
pub struct MySqlDatabaseError {
    /// The MySQL error code, e.g. `1062` for `ER_DUP_ENTRY`.
    pub code: u16,

    /// The human-readable error message.
    pub message: String,
}

impl Display for MySqlDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for MySqlDatabaseError {}

// Format a [ProtocolError] wrapped in the top-level [Error].
macro_rules! err_protocol {
    ($($args:tt)*) => {
        $crate::error::Error::Protocol($crate::error::ProtocolError(
            format!($($args)*).into_boxed_str(),
        ))
    };
}

pub(crate) use err_protocol;
