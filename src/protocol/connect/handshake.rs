use byteorder::LittleEndian;

use crate::error::Result;
use crate::io::Buf;
use crate::protocol::auth::AuthPlugin;
use crate::protocol::{Capabilities, Status};

/// The initial packet sent by the server on every new connection.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_handshake_v10.html>
/// <https://mariadb.com/kb/en/connection/#initial-handshake-packet>
#[derive(Debug)]
pub(crate) struct Handshake {
    pub(crate) protocol_version: u8,
    pub(crate) server_version: Box<str>,
    pub(crate) connection_id: u32,
    pub(crate) server_capabilities: Capabilities,
    pub(crate) server_default_collation: u8,
    pub(crate) status: Status,
    pub(crate) auth_plugin: AuthPlugin,

    /// The 20-byte authentication challenge (part 1 ++ part 2, truncated).
    pub(crate) auth_plugin_data: Box<[u8]>,
}

impl Handshake {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let protocol_version = buf.get_u8()?;
        let server_version = buf.get_str_nul()?.into();
        let connection_id = buf.get_u32::<LittleEndian>()?;

        // auth plugin data, part 1 : string<8>
        let mut scramble = Vec::with_capacity(20);
        scramble.extend_from_slice(buf.get_bytes(8)?);

        // filler : string<1>
        buf.advance(1)?;

        // capability flags, lower 16 bits : int<2>
        let capabilities_lo = buf.get_u16::<LittleEndian>()?;
        let mut capabilities = Capabilities::from_bits_truncate(capabilities_lo.into());

        // server default collation : int<1>
        let collation = buf.get_u8()?;

        // status flags : int<2>
        let status = Status::from_bits_truncate(buf.get_u16::<LittleEndian>()?);

        // capability flags, upper 16 bits : int<2>
        let capabilities_hi = buf.get_u16::<LittleEndian>()?;
        capabilities |= Capabilities::from_bits_truncate(u32::from(capabilities_hi) << 16);

        // length of auth plugin data : int<1>
        // (0x00 when the server lacks PLUGIN_AUTH)
        let auth_plugin_data_len = buf.get_u8()?;

        // reserved : string<10>
        buf.advance(10)?;

        if capabilities.contains(Capabilities::SECURE_CONNECTION) {
            // auth plugin data, part 2 : string<n> where n = max(13, length - 8)
            let len = (i32::from(auth_plugin_data_len) - 8).max(13) as usize;
            scramble.extend_from_slice(buf.get_bytes(len)?);

            // the challenge proper is 20 bytes; part 2 carries a trailing NUL
            scramble.truncate(20);
        }

        let auth_plugin = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            AuthPlugin::from_str(buf.get_str_nul()?)?
        } else {
            AuthPlugin::MySqlNativePassword
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            server_capabilities: capabilities,
            server_default_collation: collation,
            status,
            auth_plugin,
            auth_plugin_data: scramble.into_boxed_slice(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthPlugin, Capabilities, Handshake, Status};
    use matches::assert_matches;

    const HANDSHAKE_MARIA_DB_10_4_7: &[u8] = b"\n5.5.5-10.4.7-MariaDB-1:10.4.7+maria~bionic\x00\x0b\x00\x00\x00t6L\\j\"dS\x00\xfe\xf7\x08\x02\x00\xff\x81\x15\x00\x00\x00\x00\x00\x00\x07\x00\x00\x00U14Oph9\"<H5n\x00mysql_native_password\x00";
    const HANDSHAKE_MYSQL_8_0_18: &[u8] = b"\n8.0.18\x00\x19\x00\x00\x00\x114aB0c\x06g\x00\xff\xff\xff\x02\x00\xff\xc7\x15\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00tL\x03s\x0f[4\rl4. \x00caching_sha2_password\x00";

    #[test]
    fn it_decodes_handshake_mysql_8_0_18() {
        let h = Handshake::decode(HANDSHAKE_MYSQL_8_0_18).unwrap();

        assert_eq!(h.protocol_version, 10);
        assert_eq!(&*h.server_version, "8.0.18");
        assert_eq!(h.connection_id, 25);
        assert_eq!(h.server_default_collation, 255);

        assert!(h.server_capabilities.contains(
            Capabilities::PROTOCOL_41
                | Capabilities::SSL
                | Capabilities::SECURE_CONNECTION
                | Capabilities::PLUGIN_AUTH
                | Capabilities::PLUGIN_AUTH_LENENC_DATA
                | Capabilities::MULTI_STATEMENTS
                | Capabilities::MULTI_RESULTS
        ));

        assert!(h.status.contains(Status::SERVER_STATUS_AUTOCOMMIT));
        assert_matches!(h.auth_plugin, AuthPlugin::CachingSha2Password);

        assert_eq!(
            &*h.auth_plugin_data,
            &[
                17, 52, 97, 66, 48, 99, 6, 103, 116, 76, 3, 115, 15, 91, 52, 13, 108, 52, 46, 32,
            ][..]
        );
    }

    #[test]
    fn it_decodes_handshake_mariadb_10_4_7() {
        let h = Handshake::decode(HANDSHAKE_MARIA_DB_10_4_7).unwrap();

        assert_eq!(h.protocol_version, 10);
        assert_eq!(&*h.server_version, "5.5.5-10.4.7-MariaDB-1:10.4.7+maria~bionic");
        assert_eq!(h.server_default_collation, 8);

        assert!(h
            .server_capabilities
            .contains(Capabilities::PROTOCOL_41 | Capabilities::SECURE_CONNECTION));

        assert_matches!(h.auth_plugin, AuthPlugin::MySqlNativePassword);

        assert_eq!(
            &*h.auth_plugin_data,
            &[
                116, 54, 76, 92, 106, 34, 100, 83, 85, 49, 52, 79, 112, 104, 57, 34, 60, 72, 53,
                110,
            ][..]
        );
    }
}
