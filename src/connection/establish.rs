use crate::collation::{collation_id, COLLATION_UTF8MB4_GENERAL_CI, DEFAULT_COLLATION};
use crate::common::StatementCache;
use crate::connection::stream::{MySqlStream, MAX_PACKET_SIZE_ADVERTISED};
use crate::connection::{tls, MySqlConnection, SessionState, STATEMENT_CACHE_CAPACITY};
use crate::error::{err_protocol, ClientError, Error, Result};
use crate::options::MySqlConnectOptions;
use crate::protocol::auth::AuthPlugin;
use crate::protocol::connect::{AuthMoreData, AuthSwitchRequest, Handshake, HandshakeResponse};
use crate::protocol::response::{ErrPacket, OkPacket};

impl MySqlConnection {
    // https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase.html
    // https://mariadb.com/kb/en/connection/
    pub(crate) async fn establish(options: &MySqlConnectOptions) -> Result<Self> {
        let stream = MySqlStream::connect(options).await?;

        let mut conn = MySqlConnection {
            stream,
            state: SessionState::Fresh,
            cache_statement: StatementCache::new(STATEMENT_CACHE_CAPACITY),
            in_transaction: false,
            command_timeout: options.command_timeout,
            on_close: Vec::new(),
        };

        // the server speaks first
        conn.state = SessionState::AwaitInitialHandshake;

        let packet = conn.stream.recv_packet().await?;
        if packet[0] == 0xFF {
            return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
        }

        let handshake = Handshake::decode(&packet)?;

        log::debug!(
            "connected to {} as connection {}",
            handshake.server_version,
            handshake.connection_id
        );

        let (collation_name, collation) = match collation_id(&options.collation) {
            Some(id) => (options.collation.as_str(), id),

            None => {
                log::warn!(
                    "unknown collation {:?}; using {}",
                    options.collation,
                    DEFAULT_COLLATION
                );

                (DEFAULT_COLLATION, COLLATION_UTF8MB4_GENERAL_CI)
            }
        };

        tls::maybe_upgrade(
            &mut conn.stream,
            options,
            handshake.server_capabilities,
            collation,
        )
        .await?;

        let password = options.password.as_deref().unwrap_or_default();
        let auth_response = handshake
            .auth_plugin
            .scramble(password, &handshake.auth_plugin_data);

        conn.stream.write_packet(HandshakeResponse {
            max_packet_size: MAX_PACKET_SIZE_ADVERTISED,
            collation,
            username: &options.username,
            database: options.database.as_deref(),
            auth_plugin: handshake.auth_plugin,
            auth_response: &auth_response,
        })?;

        conn.stream.flush().await?;
        conn.state = SessionState::HandshakeResponseSent;

        loop {
            let packet = conn.stream.recv_packet().await?;

            match packet[0] {
                0x00 => {
                    let _ok = OkPacket::decode(&packet)?;
                    break;
                }

                0xFF => {
                    return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
                }

                0xFE => {
                    let switch = AuthSwitchRequest::decode(&packet)?;

                    // only a switch back to the pre-8.0 default is answered
                    if switch.plugin != AuthPlugin::MySqlNativePassword {
                        return Err(Error::Client(ClientError::UnsupportedAuthPlugin(
                            switch.plugin.as_str().to_owned(),
                        )));
                    }

                    let response = switch.plugin.scramble(password, &switch.data);

                    conn.stream.write_packet(&response[..])?;
                    conn.stream.flush().await?;
                }

                0x01 => {
                    // caching_sha2_password sends its status in-band
                    let more = AuthMoreData::decode(&packet)?;

                    match more.data.first().copied() {
                        // fast path: the hash was cached, an OK follows
                        Some(0x03) => {}

                        // full authentication: the server wants the password
                        // itself, permitted only on a secured transport
                        Some(0x04) => {
                            if !conn.stream.is_tls() && options.socket.is_none() {
                                return Err(Error::Client(ClientError::InsecureAuth));
                            }

                            let mut cleartext = Vec::with_capacity(password.len() + 1);
                            cleartext.extend_from_slice(password.as_bytes());
                            cleartext.push(0);

                            conn.stream.write_packet(&cleartext[..])?;
                            conn.stream.flush().await?;
                        }

                        status => {
                            return Err(err_protocol!(
                                "unexpected caching_sha2_password status byte: {:?}",
                                status
                            ));
                        }
                    }
                }

                id => {
                    return Err(err_protocol!(
                        "unexpected packet identifier 0x{:02X} during authentication",
                        id
                    ));
                }
            }
        }

        conn.state = SessionState::Established;

        // pin the session character set; the wire is always utf8mb4
        conn.execute(&format!("SET NAMES utf8mb4 COLLATE {collation_name}"))
            .await?;

        Ok(conn)
    }
}
