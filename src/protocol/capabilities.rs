// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/group__group__cs__capabilities__flags.html
// https://mariadb.com/kb/en/connection/#capabilities
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Use the improved version of the old password-based authentication.
        const LONG_PASSWORD = 0x0000_0001;

        /// Send found rows instead of affected rows in EOF_Packet.
        const FOUND_ROWS = 0x0000_0002;

        /// Get all column flags.
        const LONG_FLAG = 0x0000_0004;

        /// Database (schema) name can be specified on connect in Handshake Response Packet.
        const CONNECT_WITH_DB = 0x0000_0008;

        /// Don't allow database.table.column.
        const NO_SCHEMA = 0x0000_0010;

        /// Compression protocol supported.
        const COMPRESS = 0x0000_0020;

        /// Special handling of ODBC behavior.
        const ODBC = 0x0000_0040;

        /// Can use LOAD DATA LOCAL.
        const LOCAL_FILES = 0x0000_0080;

        /// Ignore spaces before '('.
        const IGNORE_SPACE = 0x0000_0100;

        /// New 4.1+ protocol.
        const PROTOCOL_41 = 0x0000_0200;

        /// This is an interactive client.
        const INTERACTIVE = 0x0000_0400;

        /// Use SSL encryption for the session.
        const SSL = 0x0000_0800;

        /// Client knows about transactions.
        const TRANSACTIONS = 0x0000_2000;

        /// 4.1+ authentication.
        const SECURE_CONNECTION = 0x0000_8000;

        /// Enable/disable multi-statement support.
        const MULTI_STATEMENTS = 0x0001_0000;

        /// Enable/disable multi-results.
        const MULTI_RESULTS = 0x0002_0000;

        /// Multi-results and OUT parameters in PS-protocol.
        const PS_MULTI_RESULTS = 0x0004_0000;

        /// Client supports plugin authentication.
        const PLUGIN_AUTH = 0x0008_0000;

        /// Client supports connection attributes.
        const CONNECT_ATTRS = 0x0010_0000;

        /// Enable authentication response packet to be larger than 255 bytes.
        const PLUGIN_AUTH_LENENC_DATA = 0x0020_0000;

        /// Don't close the connection for a user account with expired password.
        const CAN_HANDLE_EXPIRED_PASSWORDS = 0x0040_0000;

        /// Capable of handling server state change information.
        const SESSION_TRACK = 0x0080_0000;

        /// Client no longer needs EOF_Packet and will use OK_Packet instead.
        const DEPRECATE_EOF = 0x0100_0000;
    }
}
