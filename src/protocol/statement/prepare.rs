use byteorder::LittleEndian;

use crate::error::{err_protocol, Result};
use crate::io::{Buf, BufMut};
use crate::protocol::{Capabilities, Encode};

/// Creates a prepared statement from a SQL string.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_prepare.html>
#[derive(Debug)]
pub(crate) struct Prepare<'a> {
    pub(crate) query: &'a str,
}

impl Encode for Prepare<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_STMT_PREPARE : int<1>
        buf.put_u8(0x16);

        // query : string<EOF>
        buf.put_str(self.query);
    }
}

/// First packet of the response to [`Prepare`].
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_prepare.html#sect_protocol_com_stmt_prepare_response_ok>
#[derive(Debug)]
pub(crate) struct PrepareOk {
    pub(crate) statement_id: u32,

    /// Number of columns in the result set the statement will produce
    /// (0 if it produces none).
    pub(crate) columns: u16,

    /// Number of `?` placeholders.
    pub(crate) params: u16,
}

impl PrepareOk {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8()?;
        if header != 0x00 {
            return Err(err_protocol!(
                "expected COM_STMT_PREPARE_OK (0x00); received 0x{:02X}",
                header
            ));
        }

        let statement_id = buf.get_u32::<LittleEndian>()?;
        let columns = buf.get_u16::<LittleEndian>()?;
        let params = buf.get_u16::<LittleEndian>()?;

        // filler : string<1>, warning count : int<2> (discarded)

        Ok(Self {
            statement_id,
            columns,
            params,
        })
    }
}

/// Destroys a prepared statement. The server does not reply.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_close.html>
#[derive(Debug)]
pub(crate) struct StmtClose {
    pub(crate) statement_id: u32,
}

impl Encode for StmtClose {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_STMT_CLOSE : int<1>
        buf.put_u8(0x19);

        // statement id : int<4>
        buf.put_u32::<LittleEndian>(self.statement_id);
    }
}

#[cfg(test)]
mod tests {
    use super::{Encode, Prepare, PrepareOk, StmtClose};
    use crate::protocol::Capabilities;

    #[test]
    fn it_encodes_com_stmt_prepare() {
        let mut buf = Vec::new();
        Prepare {
            query: "UPDATE t SET v = ?",
        }
        .encode(&mut buf, Capabilities::empty());

        assert_eq!(buf, b"\x16UPDATE t SET v = ?");
    }

    #[test]
    fn it_decodes_prepare_ok() {
        let ok = PrepareOk::decode(b"\x00\x01\x00\x00\x00\x01\x00\x02\x00\x00\x00\x00").unwrap();

        assert_eq!(ok.statement_id, 1);
        assert_eq!(ok.columns, 1);
        assert_eq!(ok.params, 2);
    }

    #[test]
    fn it_encodes_com_stmt_close() {
        let mut buf = Vec::new();
        StmtClose { statement_id: 7 }.encode(&mut buf, Capabilities::empty());

        assert_eq!(buf, b"\x19\x07\x00\x00\x00");
    }
}
