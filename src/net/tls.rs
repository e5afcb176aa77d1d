use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};
use crate::net::Socket;

use self::MaybeTlsStream::*;

/// A transport that starts in cleartext and may be upgraded to TLS in place.
///
/// The upgrade consumes only the raw socket; any bytes already buffered above
/// this type are unaffected by the swap.
pub enum MaybeTlsStream {
    Raw(Socket),
    Tls(Box<TlsStream<Socket>>),
    Upgrading,
}

impl MaybeTlsStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, Tls(_))
    }

    pub async fn upgrade(&mut self, host: &str, config: Arc<ClientConfig>) -> Result<()> {
        let raw = match std::mem::replace(self, Upgrading) {
            Raw(raw) => raw,
            Tls(_) => return Err(Error::tls(UpgradeError("connection already upgraded"))),
            Upgrading => {
                return Err(Error::tls(UpgradeError(
                    "connection previously failed to upgrade",
                )))
            }
        };

        let name = ServerName::try_from(host.to_owned()).map_err(Error::tls)?;
        let stream = TlsConnector::from(config)
            .connect(name, raw)
            .await
            .map_err(Error::tls)?;

        *self = Tls(Box::new(stream));

        Ok(())
    }
}

#[derive(Debug)]
struct UpgradeError(&'static str);

impl std::fmt::Display for UpgradeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for UpgradeError {}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Raw(s) => Pin::new(s).poll_read(cx, buf),
            Tls(s) => Pin::new(s).poll_read(cx, buf),
            Upgrading => Poll::Ready(Err(broken())),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Raw(s) => Pin::new(s).poll_write(cx, buf),
            Tls(s) => Pin::new(s).poll_write(cx, buf),
            Upgrading => Poll::Ready(Err(broken())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Raw(s) => Pin::new(s).poll_flush(cx),
            Tls(s) => Pin::new(s).poll_flush(cx),
            Upgrading => Poll::Ready(Err(broken())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Raw(s) => Pin::new(s).poll_shutdown(cx),
            Tls(s) => Pin::new(s).poll_shutdown(cx),
            Upgrading => Poll::Ready(Err(broken())),
        }
    }
}

fn broken() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream lost during TLS upgrade")
}
