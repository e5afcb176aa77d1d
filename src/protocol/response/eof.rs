use byteorder::LittleEndian;

use crate::error::{err_protocol, Result};
use crate::io::Buf;
use crate::protocol::Status;

/// Terminates a sequence of column definitions or result rows.
///
/// Some servers send a short (payload < 9 bytes) OK-shaped `0xFE` packet in
/// this position; it decodes identically.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_eof_packet.html>
/// <https://mariadb.com/kb/en/eof_packet/>
#[derive(Debug)]
pub(crate) struct EofPacket {
    pub(crate) status: Status,
}

impl EofPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8()?;
        if header != 0xFE {
            return Err(err_protocol!(
                "expected EOF (0xFE); received 0x{:02X}",
                header
            ));
        }

        // warning count : int<2> (discarded)
        let _warnings = buf.get_u16::<LittleEndian>()?;

        // status flags : int<2>
        let status = Status::from_bits_truncate(buf.get_u16::<LittleEndian>()?);

        Ok(Self { status })
    }

    /// `true` when the first byte and length identify an EOF packet.
    pub(crate) fn is_eof(packet: &[u8]) -> bool {
        !packet.is_empty() && packet[0] == 0xFE && packet.len() < 9
    }
}

#[cfg(test)]
mod tests {
    use super::{EofPacket, Status};

    const EOF_MORE_RESULTS: &[u8] = b"\xfe\x00\x00\x08\x00";

    #[test]
    fn it_decodes_eof_with_more_results() {
        let p = EofPacket::decode(EOF_MORE_RESULTS).unwrap();

        assert!(p.status.contains(Status::SERVER_MORE_RESULTS_EXISTS));
    }

    #[test]
    fn it_identifies_eof_by_shape() {
        assert!(EofPacket::is_eof(EOF_MORE_RESULTS));

        // a long 0xFE packet is a length-encoded row cell, not an EOF
        assert!(!EofPacket::is_eof(&[0xFE; 12]));
        assert!(!EofPacket::is_eof(b"\x00\x00\x00"));
    }
}
