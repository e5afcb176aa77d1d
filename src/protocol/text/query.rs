use crate::io::BufMut;
use crate::protocol::{Capabilities, Encode};

/// Executes a SQL statement using the text protocol.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_query.html>
#[derive(Debug)]
pub(crate) struct ComQuery<'a>(pub(crate) &'a str);

impl Encode for ComQuery<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_QUERY : int<1>
        buf.put_u8(0x03);

        // query : string<EOF>
        buf.put_str(self.0);
    }
}

/// Tells the server we are hanging up. No reply is expected.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_quit.html>
#[derive(Debug)]
pub(crate) struct ComQuit;

impl Encode for ComQuit {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_QUIT : int<1>
        buf.put_u8(0x01);
    }
}

/// Changes the default database of the session.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_init_db.html>
#[derive(Debug)]
pub(crate) struct ComInitDb<'a>(pub(crate) &'a str);

impl Encode for ComInitDb<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_INIT_DB : int<1>
        buf.put_u8(0x02);

        // schema name : string<EOF>
        buf.put_str(self.0);
    }
}

/// Checks that the server is alive.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_ping.html>
#[derive(Debug)]
pub(crate) struct ComPing;

impl Encode for ComPing {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_PING : int<1>
        buf.put_u8(0x0E);
    }
}

#[cfg(test)]
mod tests {
    use super::{ComInitDb, ComQuery, ComQuit, Encode};
    use crate::protocol::Capabilities;

    #[test]
    fn it_encodes_com_query() {
        let mut buf = Vec::new();
        ComQuery("SELECT 1").encode(&mut buf, Capabilities::empty());

        assert_eq!(buf, b"\x03SELECT 1");
    }

    #[test]
    fn it_encodes_com_quit() {
        let mut buf = Vec::new();
        ComQuit.encode(&mut buf, Capabilities::empty());

        assert_eq!(buf, b"\x01");
    }

    #[test]
    fn it_encodes_com_init_db() {
        let mut buf = Vec::new();
        ComInitDb("shop").encode(&mut buf, Capabilities::empty());

        assert_eq!(buf, b"\x02shop");
    }
}
