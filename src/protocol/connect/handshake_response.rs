use byteorder::LittleEndian;

use crate::io::{BufMut, BufMutExt};
use crate::protocol::auth::AuthPlugin;
use crate::protocol::{Capabilities, Encode};

/// The client's answer to the initial handshake (protocol 4.1 form).
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_handshake_response.html>
/// <https://mariadb.com/kb/en/connection/#handshake-response-packet>
#[derive(Debug)]
pub(crate) struct HandshakeResponse<'a> {
    pub(crate) max_packet_size: u32,
    pub(crate) collation: u8,
    pub(crate) username: &'a str,
    pub(crate) database: Option<&'a str>,
    pub(crate) auth_plugin: AuthPlugin,
    pub(crate) auth_response: &'a [u8],
}

impl Encode for HandshakeResponse<'_> {
    fn encode(&self, buf: &mut Vec<u8>, capabilities: Capabilities) {
        // client capability flags : int<4>
        buf.put_u32::<LittleEndian>(capabilities.bits());

        // max packet size : int<4>
        buf.put_u32::<LittleEndian>(self.max_packet_size);

        // client character collation : int<1>
        buf.put_u8(self.collation);

        // reserved : string<23>
        buf.advance(23);

        // username : string<NUL>
        buf.put_str_nul(self.username);

        // auth response : string<lenenc>
        // (the client always advertises PLUGIN_AUTH_LENENC_DATA)
        buf.put_bytes_lenenc(self.auth_response);

        if capabilities.contains(Capabilities::CONNECT_WITH_DB) {
            if let Some(database) = self.database {
                // default database : string<NUL>
                buf.put_str_nul(database);
            }
        }

        // client auth plugin name : string<NUL>
        buf.put_str_nul(self.auth_plugin.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthPlugin, Capabilities, Encode, HandshakeResponse};

    #[test]
    fn it_encodes_handshake_response() {
        let mut buf = Vec::new();

        let capabilities = Capabilities::PROTOCOL_41
            | Capabilities::SECURE_CONNECTION
            | Capabilities::PLUGIN_AUTH
            | Capabilities::PLUGIN_AUTH_LENENC_DATA
            | Capabilities::CONNECT_WITH_DB;

        HandshakeResponse {
            max_packet_size: 50 * 1024 * 1024,
            collation: 45,
            username: "root",
            database: Some("shop"),
            auth_plugin: AuthPlugin::MySqlNativePassword,
            auth_response: &[0xAA; 20],
        }
        .encode(&mut buf, capabilities);

        // fixed preamble is 32 bytes
        assert_eq!(u32::from_le_bytes(buf[..4].try_into().unwrap()), capabilities.bits());
        assert_eq!(&buf[9..32], &[0; 23]);

        // username, then length-prefixed auth response
        assert_eq!(&buf[32..37], b"root\0");
        assert_eq!(buf[37], 20);
        assert_eq!(&buf[58..63], b"shop\0");
        assert_eq!(&buf[63..], b"mysql_native_password\0");
    }
}
