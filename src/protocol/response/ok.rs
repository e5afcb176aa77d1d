use byteorder::LittleEndian;

use crate::error::{err_protocol, Result};
use crate::io::{Buf, BufExt};
use crate::protocol::Status;

/// Signals successful completion of a command.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_ok_packet.html>
/// <https://mariadb.com/kb/en/ok_packet/>
#[derive(Debug)]
pub(crate) struct OkPacket {
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
    pub(crate) status: Status,
}

impl OkPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8()?;
        if header != 0x00 && header != 0xFE {
            return Err(err_protocol!(
                "expected OK (0x00 or 0xFE); received 0x{:02X}",
                header
            ));
        }

        let affected_rows = buf.get_uint_lenenc()?.unwrap_or(0);
        let last_insert_id = buf.get_uint_lenenc()?.unwrap_or(0);

        // status flags, warning count, and the human-readable info string are
        // tolerated but only the status flags are retained
        let status = if buf.len() >= 2 {
            Status::from_bits_truncate(buf.get_u16::<LittleEndian>()?)
        } else {
            Status::empty()
        };

        Ok(Self {
            affected_rows,
            last_insert_id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{OkPacket, Status};

    const OK_HANDSHAKE: &[u8] = b"\x00\x00\x00\x02@\x00\x00";

    #[test]
    fn it_decodes_ok_after_handshake() {
        let p = OkPacket::decode(OK_HANDSHAKE).unwrap();

        assert_eq!(p.affected_rows, 0);
        assert_eq!(p.last_insert_id, 0);
        assert!(p.status.contains(Status::SERVER_STATUS_AUTOCOMMIT));
        assert!(p.status.contains(Status::SERVER_SESSION_STATE_CHANGED));
    }

    #[test]
    fn it_decodes_ok_with_affected_rows() {
        // 3 affected rows, last insert id 7
        let p = OkPacket::decode(b"\x00\x03\x07\x02\x00\x00\x00").unwrap();

        assert_eq!(p.affected_rows, 3);
        assert_eq!(p.last_insert_id, 7);
    }

    #[test]
    fn it_rejects_a_non_ok_header() {
        assert!(OkPacket::decode(b"\x01\x00\x00").is_err());
    }
}
