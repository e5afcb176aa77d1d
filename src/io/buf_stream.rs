use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// A duplex byte stream with a write buffer and a rolling read buffer.
///
/// Reads are exposed as `peek`/`consume` so a caller can wait for a complete
/// frame before committing to it; bytes that arrived beyond the current frame
/// carry over to the next read. The buffer survives a TLS upgrade of the
/// underlying stream.
pub struct BufStream<S> {
    pub(crate) stream: S,

    // writes with `write` are buffered and sent on `flush`
    pub(crate) wbuf: Vec<u8>,

    // read buffer; the prefix [0, consumed) has been handed out already
    rbuf: BytesMut,
}

impl<S> BufStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            wbuf: Vec::with_capacity(1024),
            rbuf: BytesMut::with_capacity(8192),
        }
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.wbuf
    }

    pub async fn flush(&mut self) -> Result<()> {
        if !self.wbuf.is_empty() {
            self.stream.write_all(&self.wbuf).await?;
            self.wbuf.clear();
        }

        self.stream.flush().await?;

        Ok(())
    }

    /// Waits until at least `cnt` bytes are buffered and returns them
    /// without consuming. A clean EOF before `cnt` bytes is an error: the
    /// server hung up mid-frame.
    pub async fn peek(&mut self, cnt: usize) -> Result<&[u8]> {
        while self.rbuf.len() < cnt {
            let n = self.stream.read_buf(&mut self.rbuf).await?;

            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )
                .into());
            }
        }

        Ok(&self.rbuf[..cnt])
    }

    #[inline]
    pub fn consume(&mut self, cnt: usize) {
        let _ = self.rbuf.split_to(cnt);
    }

    /// Number of bytes read from the transport but not yet consumed.
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.rbuf.len()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BufStream;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn it_peeks_across_partial_writes() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream = BufStream::new(client);

        // deliver a 7-byte frame one byte at a time
        for b in [0x01, 0x00, 0x00, 0x00, 0xAB, 0x05, 0x00] {
            server.write_all(&[b]).await.unwrap();
        }

        let header = stream.peek(4).await.unwrap().to_vec();
        assert_eq!(header, [0x01, 0x00, 0x00, 0x00]);
        stream.consume(4);

        assert_eq!(stream.peek(1).await.unwrap(), [0xAB]);
        stream.consume(1);

        // remaining bytes carry over
        assert_eq!(stream.buffered(), 2);
    }

    #[tokio::test]
    async fn it_errors_on_eof_mid_frame() {
        let (client, server) = tokio::io::duplex(64);
        let mut stream = BufStream::new(client);

        drop(server);

        assert!(stream.peek(4).await.is_err());
    }
}
