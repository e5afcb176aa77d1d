use byteorder::LittleEndian;

use crate::error::{err_protocol, MySqlDatabaseError, Result};
use crate::io::Buf;

/// An error response from the server.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_err_packet.html>
/// <https://mariadb.com/kb/en/err_packet/>
#[derive(Debug)]
pub(crate) struct ErrPacket {
    pub(crate) error_code: u16,
    pub(crate) error_message: Box<str>,
}

impl ErrPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8()?;
        if header != 0xFF {
            return Err(err_protocol!(
                "expected ERR (0xFF); received 0x{:02X}",
                header
            ));
        }

        let error_code = buf.get_u16::<LittleEndian>()?;

        // SQL state marker '#' : string<1> and SQL state : string<5>
        // (both discarded; only sent after the handshake completes)
        if buf.first() == Some(&b'#') {
            buf.advance(6)?;
        }

        let error_message = buf.get_str_eof()?.into();

        Ok(Self {
            error_code,
            error_message,
        })
    }
}

impl From<ErrPacket> for MySqlDatabaseError {
    fn from(err: ErrPacket) -> Self {
        MySqlDatabaseError {
            code: err.error_code,
            message: err.error_message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrPacket;

    const ERR_HANDSHAKE_UNKNOWN_DB: &[u8] = b"\xff\x19\x04#42000Unknown database 'unknown'";

    #[test]
    fn it_decodes_err_unknown_database() {
        let p = ErrPacket::decode(ERR_HANDSHAKE_UNKNOWN_DB).unwrap();

        assert_eq!(p.error_code, 1049);
        assert_eq!(&*p.error_message, "Unknown database 'unknown'");
    }

    #[test]
    fn it_decodes_err_without_sql_state() {
        let p = ErrPacket::decode(b"\xff\x15\x04Access denied").unwrap();

        assert_eq!(p.error_code, 1045);
        assert_eq!(&*p.error_message, "Access denied");
    }
}
