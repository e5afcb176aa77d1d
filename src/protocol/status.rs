// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/mysql__com_8h.html#a1d854e841086925be1883e4d7b4e8cad
// https://mariadb.com/kb/en/ok_packet/#server-status-flag
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u16 {
        /// A transaction is currently active.
        const SERVER_STATUS_IN_TRANS = 0x0001;

        /// Autocommit mode is set.
        const SERVER_STATUS_AUTOCOMMIT = 0x0002;

        /// More results exist (more packets will follow).
        const SERVER_MORE_RESULTS_EXISTS = 0x0008;

        const SERVER_QUERY_NO_GOOD_INDEX_USED = 0x0010;
        const SERVER_QUERY_NO_INDEX_USED = 0x0020;

        /// When using COM_STMT_FETCH, indicate that a cursor exists for the statement.
        const SERVER_STATUS_CURSOR_EXISTS = 0x0040;

        /// When using COM_STMT_FETCH, indicate that the cursor is exhausted.
        const SERVER_STATUS_LAST_ROW_SENT = 0x0080;

        /// The current database was dropped.
        const SERVER_STATUS_DB_DROPPED = 0x0100;

        /// Backslashes do not escape.
        const SERVER_STATUS_NO_BACKSLASH_ESCAPES = 0x0200;

        /// Session state change. See SESSION_TRACK.
        const SERVER_SESSION_STATE_CHANGED = 0x4000;
    }
}
