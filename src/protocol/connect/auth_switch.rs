use crate::error::{err_protocol, Result};
use crate::io::Buf;
use crate::protocol::auth::AuthPlugin;

/// Mid-handshake request from the server to restart authentication with a
/// different plugin.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_auth_switch_request.html>
#[derive(Debug)]
pub(crate) struct AuthSwitchRequest {
    pub(crate) plugin: AuthPlugin,
    pub(crate) data: Box<[u8]>,
}

impl AuthSwitchRequest {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8()?;
        if header != 0xFE {
            return Err(err_protocol!(
                "expected AUTH_SWITCH (0xFE); received 0x{:02X}",
                header
            ));
        }

        let plugin = AuthPlugin::from_str(buf.get_str_nul()?)?;
        let data = buf.get_bytes(buf.len())?.into();

        Ok(Self { plugin, data })
    }
}

/// Additional authentication data from the server, seen with
/// `caching_sha2_password`. The first payload byte is `0x01`; the
/// remainder is plugin-specific.
#[derive(Debug)]
pub(crate) struct AuthMoreData {
    pub(crate) data: Box<[u8]>,
}

impl AuthMoreData {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8()?;
        if header != 0x01 {
            return Err(err_protocol!(
                "expected AUTH_MORE_DATA (0x01); received 0x{:02X}",
                header
            ));
        }

        Ok(Self {
            data: buf.get_bytes(buf.len())?.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthPlugin, AuthSwitchRequest};
    use matches::assert_matches;

    const AUTH_SWITCH_NATIVE: &[u8] = b"\xfemysql_native_password\x00abcdefghijklmnopqrst\x00";

    #[test]
    fn it_decodes_auth_switch_to_native() {
        let p = AuthSwitchRequest::decode(AUTH_SWITCH_NATIVE).unwrap();

        assert_matches!(p.plugin, AuthPlugin::MySqlNativePassword);
        assert_eq!(&*p.data, b"abcdefghijklmnopqrst\x00");
    }

    #[test]
    fn it_rejects_an_unknown_plugin() {
        assert!(AuthSwitchRequest::decode(b"\xfedialog\x00").is_err());
    }
}
