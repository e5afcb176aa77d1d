use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{err_protocol, ClientError, Error, Result};
use crate::io::{BufExt, BufStream};
use crate::net::{MaybeTlsStream, Socket};
use crate::options::{MySqlConnectOptions, MySqlSslMode};
use crate::protocol::response::{EofPacket, ErrPacket, OkPacket};
use crate::protocol::{Capabilities, Encode, Status};

// One packet frame carries at most 2^24 - 1 payload bytes; larger commands
// would need the packet-splitting protocol, which this client does not speak.
pub(crate) const MAX_PACKET_SIZE: usize = 0xFF_FF_FF;

// Advertised to the server in the handshake response.
pub(crate) const MAX_PACKET_SIZE_ADVERTISED: u32 = 50 * 1024 * 1024;

/// What the read side of the stream still owes us before the next command
/// may be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Busy {
    NotBusy,

    /// Expecting a result to begin: OK/ERR or a column count.
    Result,

    /// Expecting result rows, terminated by EOF.
    Row,
}

/// The packet framer: turns the buffered byte stream into MySQL packets and
/// frames outbound payloads, tracking sequence ids and unread responses.
pub(crate) struct MySqlStream {
    pub(crate) stream: BufStream<MaybeTlsStream>,

    /// Capabilities the client advertised; fixed for the session.
    pub(crate) capabilities: Capabilities,

    pub(crate) sequence_id: u8,

    pub(crate) busy: Busy,
}

impl MySqlStream {
    pub(crate) async fn connect(options: &MySqlConnectOptions) -> Result<Self> {
        let socket = match &options.socket {
            Some(path) => Socket::connect_uds(path).await?,
            None => Socket::connect_tcp(&options.host, options.port).await?,
        };

        let mut capabilities = Capabilities::PROTOCOL_41
            | Capabilities::SECURE_CONNECTION
            | Capabilities::PLUGIN_AUTH
            | Capabilities::PLUGIN_AUTH_LENENC_DATA
            | Capabilities::MULTI_STATEMENTS
            | Capabilities::MULTI_RESULTS;

        if options.database.is_some() {
            capabilities |= Capabilities::CONNECT_WITH_DB;
        }

        if options.ssl_mode != MySqlSslMode::Disabled {
            capabilities |= Capabilities::SSL;
        }

        Ok(Self {
            stream: BufStream::new(MaybeTlsStream::Raw(socket)),
            capabilities,
            sequence_id: 0,
            busy: Busy::NotBusy,
        })
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.stream.stream.is_tls()
    }

    /// Frames and buffers one packet; `flush` actually sends it.
    pub(crate) fn write_packet<T: Encode>(&mut self, packet: T) -> Result<()> {
        let buf = self.stream.buffer_mut();

        // reserve room for the header and measure the payload once encoded
        let header_offset = buf.len();
        crate::io::BufMut::advance(buf, 4);

        packet.encode(buf, self.capabilities);

        let len = buf.len() - header_offset - 4;
        if len >= MAX_PACKET_SIZE {
            buf.truncate(header_offset);
            return Err(Error::Client(ClientError::PacketTooLarge(len)));
        }

        let header = &mut buf[header_offset..];
        LittleEndian::write_u24(header, len as u32);
        header[3] = self.sequence_id;

        self.sequence_id = self.sequence_id.wrapping_add(1);

        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await
    }

    /// Sends one command packet: sequence id 0, a single frame.
    pub(crate) async fn send_packet<T: Encode>(&mut self, packet: T) -> Result<()> {
        self.sequence_id = 0;
        self.write_packet(packet)?;
        self.flush().await
    }

    /// Receives one packet payload (header stripped).
    pub(crate) async fn recv_packet(&mut self) -> Result<Bytes> {
        let header = self.stream.peek(4).await?;

        let payload_len = LittleEndian::read_u24(header) as usize;
        self.sequence_id = header[3].wrapping_add(1);
        self.stream.consume(4);

        if payload_len == MAX_PACKET_SIZE {
            // a full-sized frame announces a continuation frame
            return Err(err_protocol!(
                "received a split packet; packets of 2^24-1 bytes are not supported"
            ));
        }

        let payload = self.stream.peek(payload_len).await?;
        let packet = Bytes::copy_from_slice(payload);
        self.stream.consume(payload_len);

        if packet.is_empty() {
            return Err(err_protocol!("received an empty packet"));
        }

        Ok(packet)
    }

    /// Receives a packet and decodes it as OK, surfacing a server ERR as an
    /// error.
    pub(crate) async fn recv_ok(&mut self) -> Result<OkPacket> {
        let packet = self.recv_packet().await?;

        match packet[0] {
            0x00 | 0xFE => OkPacket::decode(&packet),

            0xFF => Err(Error::Server(ErrPacket::decode(&packet)?.into())),

            id => Err(err_protocol!(
                "unexpected packet identifier 0x{:02X} when expecting OK (0x00) or ERR (0xFF)",
                id
            )),
        }
    }

    /// Receives a packet and requires it to be EOF.
    pub(crate) async fn recv_eof(&mut self) -> Result<EofPacket> {
        let packet = self.recv_packet().await?;

        if packet[0] == 0xFF {
            return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
        }

        if !EofPacket::is_eof(&packet) {
            return Err(err_protocol!(
                "unexpected packet identifier 0x{:02X} when expecting EOF (0xFE)",
                packet[0]
            ));
        }

        EofPacket::decode(&packet)
    }

    /// Flushes buffered writes and drains any response packets a previous
    /// command (an abandoned row stream, a deferred ROLLBACK, a timed-out
    /// multi-result statement) left on the socket.
    pub(crate) async fn wait_until_ready(&mut self) -> Result<()> {
        if !self.stream.wbuf.is_empty() {
            self.flush().await?;
        }

        while self.busy != Busy::NotBusy {
            while self.busy == Busy::Row {
                let packet = self.recv_packet().await?;

                if EofPacket::is_eof(&packet) {
                    let eof = EofPacket::decode(&packet)?;

                    self.busy = if eof.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                        Busy::Result
                    } else {
                        Busy::NotBusy
                    };
                } else if packet[0] == 0xFF {
                    // an error terminates the result; it belongs to the
                    // abandoned statement, so it is not surfaced
                    let err = ErrPacket::decode(&packet)?;
                    log::debug!("discarding deferred server error {}", err.error_code);

                    self.busy = Busy::NotBusy;
                }
            }

            while self.busy == Busy::Result {
                let packet = self.recv_packet().await?;

                match packet[0] {
                    0x00 => {
                        let ok = OkPacket::decode(&packet)?;

                        if !ok.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                            self.busy = Busy::NotBusy;
                        }
                    }

                    0xFE if EofPacket::is_eof(&packet) => {
                        let eof = EofPacket::decode(&packet)?;

                        if !eof.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                            self.busy = Busy::NotBusy;
                        }
                    }

                    0xFF => {
                        let err = ErrPacket::decode(&packet)?;
                        log::debug!("discarding deferred server error {}", err.error_code);

                        self.busy = Busy::NotBusy;
                    }

                    _ => {
                        // start of a result set: skip its column definitions
                        let mut buf: &[u8] = &packet;
                        let columns = buf.get_uint_lenenc()?.unwrap_or(0);

                        for _ in 0..columns {
                            let _ = self.recv_packet().await?;
                        }

                        self.recv_eof().await?;
                        self.busy = Busy::Row;
                    }
                }
            }
        }

        Ok(())
    }

    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await
    }
}
