/// A server-side prepared statement.
///
/// Holds only the server-assigned id and the statement's shape; execution
/// goes through the connection that prepared it. Executing it after that
/// connection closed fails with `ClientError::ConnectionClosed`.
#[derive(Debug, Clone)]
pub struct MySqlStatement {
    pub(crate) id: u32,
    pub(crate) params: u16,
    pub(crate) columns: u16,
}

impl MySqlStatement {
    /// Number of `?` placeholders the statement takes.
    pub fn param_count(&self) -> usize {
        self.params.into()
    }

    /// Number of columns in the result set the statement produces.
    pub fn column_count(&self) -> usize {
        self.columns.into()
    }
}
