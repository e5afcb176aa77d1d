use byteorder::LittleEndian;

use crate::io::BufMut;
use crate::protocol::{Capabilities, Encode};

/// Truncated handshake response asking the server to switch the socket to TLS
/// before the real handshake response is sent. Always exactly 32 bytes.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_ssl_request.html>
#[derive(Debug)]
pub(crate) struct SslRequest {
    pub(crate) max_packet_size: u32,
    pub(crate) collation: u8,
}

impl Encode for SslRequest {
    fn encode(&self, buf: &mut Vec<u8>, capabilities: Capabilities) {
        debug_assert!(capabilities.contains(Capabilities::SSL));

        // client capability flags : int<4>
        buf.put_u32::<LittleEndian>(capabilities.bits());

        // max packet size : int<4>
        buf.put_u32::<LittleEndian>(self.max_packet_size);

        // client character collation : int<1>
        buf.put_u8(self.collation);

        // reserved : string<23>
        buf.advance(23);
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, Encode, SslRequest};

    #[test]
    fn it_encodes_a_32_byte_frame() {
        let mut buf = Vec::new();

        SslRequest {
            max_packet_size: 50 * 1024 * 1024,
            collation: 45,
        }
        .encode(&mut buf, Capabilities::PROTOCOL_41 | Capabilities::SSL);

        assert_eq!(buf.len(), 32);
    }
}
