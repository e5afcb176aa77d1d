use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::arguments::MySqlArguments;
use crate::column::MySqlColumn;
use crate::connection::stream::Busy;
use crate::connection::{MySqlConnection, SessionState};
use crate::error::{err_protocol, ClientError, Error, Result};
use crate::io::BufExt;
use crate::params::Params;
use crate::placeholders::{expand_named, Expanded};
use crate::protocol::response::{EofPacket, ErrPacket, OkPacket};
use crate::protocol::statement::{BinaryRow, Execute, Prepare, PrepareOk, StmtClose};
use crate::protocol::text::{ColumnDefinition, ComQuery, TextRow};
use crate::protocol::Status;
use crate::query_result::{QueryResults, ResultSet};
use crate::row::MySqlRow;
use crate::statement::MySqlStatement;
use crate::type_info::MySqlTypeInfo;
use crate::value::{MySqlValueFormat, Value};

impl MySqlConnection {
    /// Runs a SQL statement (or several, separated by `;`) over the text
    /// protocol and materializes every result set it produces.
    pub async fn execute(&mut self, sql: &str) -> Result<QueryResults> {
        self.execute_with(sql, Params::None).await
    }

    /// Runs a SQL statement with bound parameters.
    ///
    /// Positional parameters always execute through an auto-prepared
    /// statement (cached per connection). Named parameters are rewritten to
    /// positional form first; when the statement text contains no usable
    /// `:name` placeholder they are substituted client-side instead.
    pub async fn execute_with(&mut self, sql: &str, params: impl Into<Params>) -> Result<QueryResults> {
        let params = params.into();

        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        let result = match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run_execute(sql, params)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Client(ClientError::Timeout)),
            },

            None => self.run_execute(sql, params).await,
        };

        self.finish_command(result).await
    }

    /// Prepares a statement for repeated execution with
    /// [`execute_prepared`][Self::execute_prepared].
    pub async fn prepare(&mut self, sql: &str) -> Result<MySqlStatement> {
        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        let result = async {
            self.stream.wait_until_ready().await?;
            self.prepare_statement(sql).await
        }
        .await;

        self.finish_command(result).await
    }

    /// Executes a prepared statement with positional parameters.
    ///
    /// A parameter-count mismatch is rejected before anything is written to
    /// the socket.
    pub async fn execute_prepared(
        &mut self,
        statement: &MySqlStatement,
        params: impl Into<Params>,
    ) -> Result<QueryResults> {
        let values = match params.into() {
            Params::None => Vec::new(),
            Params::Positional(values) => values,

            Params::Named(_) => {
                return Err(Error::Client(ClientError::UnsupportedParamType(
                    "named parameters cannot bind to an explicitly prepared statement",
                )));
            }
        };

        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        let result = match self.command_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.run_execute_prepared(statement, &values))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::Client(ClientError::Timeout)),
                }
            }

            None => self.run_execute_prepared(statement, &values).await,
        };

        self.finish_command(result).await
    }

    /// Runs a statement and streams the rows of its (single) result set
    /// instead of materializing them.
    ///
    /// The stream borrows the connection; drop it to abandon the remaining
    /// rows (they are drained before the next command). Statements that
    /// produce multiple result sets are not supported in this mode: the
    /// stream ends after the first set and the rest are discarded.
    pub async fn fetch(&mut self, sql: &str, params: impl Into<Params>) -> Result<RowStream<'_>> {
        let params = params.into();

        self.ensure_established()?;
        self.state = SessionState::AwaitingCommandResponse;

        match self.start_fetch(sql, params).await {
            Ok(FetchStart::Rows {
                columns,
                column_names,
                type_infos,
                format,
            }) => Ok(RowStream {
                conn: self,
                columns,
                column_names,
                type_infos,
                format,
                affected_rows: 0,
                last_insert_id: 0,
                finished: false,
            }),

            Ok(FetchStart::Empty {
                affected_rows,
                last_insert_id,
            }) => {
                self.state = SessionState::Established;

                Ok(RowStream {
                    conn: self,
                    columns: Arc::new(Vec::new()),
                    column_names: Arc::new(HashMap::new()),
                    type_infos: Vec::new(),
                    format: MySqlValueFormat::Text,
                    affected_rows,
                    last_insert_id,
                    finished: true,
                })
            }

            Err(err) => Err(self.finish_command::<()>(Err(err)).await.unwrap_err()),
        }
    }

    async fn run_execute(&mut self, sql: &str, params: Params) -> Result<QueryResults> {
        self.stream.wait_until_ready().await?;

        match params {
            Params::Named(map) => match expand_named(sql, &map)? {
                Expanded::Literal(sql) => {
                    self.stream.send_packet(ComQuery(&sql)).await?;
                    self.collect_results(MySqlValueFormat::Text).await
                }

                Expanded::Positional { sql, values } => self.run_auto_prepared(&sql, &values).await,
            },

            Params::Positional(values) if !values.is_empty() => {
                self.run_auto_prepared(sql, &values).await
            }

            // no parameters to bind; the literal text protocol suffices
            _ => {
                self.stream.send_packet(ComQuery(sql)).await?;
                self.collect_results(MySqlValueFormat::Text).await
            }
        }
    }

    async fn run_auto_prepared(&mut self, sql: &str, values: &[Value]) -> Result<QueryResults> {
        let statement = self.get_or_prepare(false, sql).await?;

        self.send_execute(&statement, values).await?;
        self.collect_results(MySqlValueFormat::Binary).await
    }

    async fn run_execute_prepared(
        &mut self,
        statement: &MySqlStatement,
        values: &[Value],
    ) -> Result<QueryResults> {
        self.stream.wait_until_ready().await?;
        self.send_execute(statement, values).await?;
        self.collect_results(MySqlValueFormat::Binary).await
    }

    async fn send_execute(&mut self, statement: &MySqlStatement, values: &[Value]) -> Result<()> {
        if statement.param_count() != values.len() {
            return Err(Error::Client(ClientError::ArityMismatch {
                expected: statement.param_count(),
                given: values.len(),
            }));
        }

        let arguments = MySqlArguments::from_values(values)?;

        self.stream
            .send_packet(Execute {
                statement_id: statement.id,
                arguments: &arguments,
            })
            .await
    }

    /// Fetches a cached auto-prepared statement or prepares it now,
    /// evicting (and closing) the least recently used statement when the
    /// cache is full.
    async fn get_or_prepare(&mut self, iterable: bool, sql: &str) -> Result<MySqlStatement> {
        if let Some(statement) = self.cache_statement.get(iterable, sql) {
            return Ok(statement.clone());
        }

        let statement = self.prepare_statement(sql).await?;

        if let Some(evicted) = self
            .cache_statement
            .insert(iterable, sql, statement.clone())
        {
            self.stream
                .send_packet(StmtClose {
                    statement_id: evicted.id,
                })
                .await?;
        }

        Ok(statement)
    }

    // https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_prepare.html#sect_protocol_com_stmt_prepare_response
    async fn prepare_statement(&mut self, sql: &str) -> Result<MySqlStatement> {
        self.stream.send_packet(Prepare { query: sql }).await?;

        let packet = self.stream.recv_packet().await?;
        if packet[0] == 0xFF {
            return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
        }

        let ok = PrepareOk::decode(&packet)?;

        // parameter and column definitions are consumed but not exposed;
        // each group is terminated by an EOF when non-empty
        for _ in 0..ok.params {
            let _ = self.stream.recv_packet().await?;
        }

        if ok.params > 0 {
            self.stream.recv_eof().await?;
        }

        for _ in 0..ok.columns {
            let _ = self.stream.recv_packet().await?;
        }

        if ok.columns > 0 {
            self.stream.recv_eof().await?;
        }

        Ok(MySqlStatement {
            id: ok.statement_id,
            params: ok.params,
            columns: ok.columns,
        })
    }

    /// Drives the result sub-state machine to completion, materializing
    /// every result set the server chains with `SERVER_MORE_RESULTS_EXISTS`.
    async fn collect_results(&mut self, format: MySqlValueFormat) -> Result<QueryResults> {
        self.stream.busy = Busy::Result;

        let mut sets = Vec::new();

        loop {
            let packet = self.stream.recv_packet().await?;

            match packet[0] {
                // a result-set-less statement completed
                0x00 => {
                    let ok = OkPacket::decode(&packet)?;

                    self.in_transaction = ok.status.contains(Status::SERVER_STATUS_IN_TRANS);
                    sets.push(ResultSet::empty(ok.affected_rows, ok.last_insert_id));

                    if ok.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                        continue;
                    }

                    self.stream.busy = Busy::NotBusy;
                    break;
                }

                0xFF => {
                    self.stream.busy = Busy::NotBusy;
                    return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
                }

                _ => {
                    let (columns, column_names) = self.recv_result_metadata(&packet).await?;
                    let type_infos: Vec<MySqlTypeInfo> =
                        columns.iter().map(|c| c.type_info.clone()).collect();

                    self.stream.busy = Busy::Row;

                    let mut rows = Vec::new();

                    let eof = loop {
                        let packet = self.stream.recv_packet().await?;

                        if EofPacket::is_eof(&packet) {
                            break EofPacket::decode(&packet)?;
                        }

                        if packet[0] == 0xFF {
                            self.stream.busy = Busy::NotBusy;
                            return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
                        }

                        rows.push(decode_row(
                            packet,
                            format,
                            &columns,
                            &column_names,
                            &type_infos,
                        )?);
                    };

                    self.in_transaction = eof.status.contains(Status::SERVER_STATUS_IN_TRANS);

                    sets.push(ResultSet {
                        columns,
                        column_names,
                        rows,
                        affected_rows: 0,
                        last_insert_id: 0,
                    });

                    if eof.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                        self.stream.busy = Busy::Result;
                        continue;
                    }

                    self.stream.busy = Busy::NotBusy;
                    break;
                }
            }
        }

        Ok(QueryResults { sets })
    }

    async fn recv_result_metadata(
        &mut self,
        packet: &Bytes,
    ) -> Result<(Arc<Vec<MySqlColumn>>, Arc<HashMap<Box<str>, usize>>)> {
        let mut buf: &[u8] = packet;

        let count = buf
            .get_uint_lenenc()?
            .ok_or_else(|| err_protocol!("unexpected NULL marker in place of a column count"))?
            as usize;

        if !buf.is_empty() {
            return Err(err_protocol!("trailing bytes after column count"));
        }

        let mut columns = Vec::with_capacity(count);
        let mut column_names = HashMap::with_capacity(count);

        for i in 0..count {
            let packet = self.stream.recv_packet().await?;
            let def = ColumnDefinition::decode(&packet)?;

            // named lookup is case-insensitive; with duplicates the later
            // column wins
            column_names.insert(def.name().to_ascii_lowercase().into_boxed_str(), i);
            columns.push(MySqlColumn::from_definition(i, &def));
        }

        self.stream.recv_eof().await?;

        Ok((Arc::new(columns), Arc::new(column_names)))
    }

    async fn start_fetch(&mut self, sql: &str, params: Params) -> Result<FetchStart> {
        self.stream.wait_until_ready().await?;

        let format = match params {
            Params::Named(map) => match expand_named(sql, &map)? {
                Expanded::Literal(sql) => {
                    self.stream.send_packet(ComQuery(&sql)).await?;
                    MySqlValueFormat::Text
                }

                Expanded::Positional { sql, values } => {
                    let statement = self.get_or_prepare(true, &sql).await?;
                    self.send_execute(&statement, &values).await?;
                    MySqlValueFormat::Binary
                }
            },

            Params::Positional(values) if !values.is_empty() => {
                let statement = self.get_or_prepare(true, sql).await?;
                self.send_execute(&statement, &values).await?;
                MySqlValueFormat::Binary
            }

            _ => {
                self.stream.send_packet(ComQuery(sql)).await?;
                MySqlValueFormat::Text
            }
        };

        self.stream.busy = Busy::Result;

        let packet = self.stream.recv_packet().await?;

        match packet[0] {
            0x00 => {
                let ok = OkPacket::decode(&packet)?;

                self.in_transaction = ok.status.contains(Status::SERVER_STATUS_IN_TRANS);

                // any chained result is drained before the next command
                self.stream.busy = if ok.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                    Busy::Result
                } else {
                    Busy::NotBusy
                };

                Ok(FetchStart::Empty {
                    affected_rows: ok.affected_rows,
                    last_insert_id: ok.last_insert_id,
                })
            }

            0xFF => {
                self.stream.busy = Busy::NotBusy;
                Err(Error::Server(ErrPacket::decode(&packet)?.into()))
            }

            _ => {
                let (columns, column_names) = self.recv_result_metadata(&packet).await?;
                let type_infos = columns.iter().map(|c| c.type_info.clone()).collect();

                self.stream.busy = Busy::Row;

                Ok(FetchStart::Rows {
                    columns,
                    column_names,
                    type_infos,
                    format,
                })
            }
        }
    }
}

enum FetchStart {
    Empty {
        affected_rows: u64,
        last_insert_id: u64,
    },

    Rows {
        columns: Arc<Vec<MySqlColumn>>,
        column_names: Arc<HashMap<Box<str>, usize>>,
        type_infos: Vec<MySqlTypeInfo>,
        format: MySqlValueFormat,
    },
}

fn decode_row(
    packet: Bytes,
    format: MySqlValueFormat,
    columns: &Arc<Vec<MySqlColumn>>,
    column_names: &Arc<HashMap<Box<str>, usize>>,
    type_infos: &[MySqlTypeInfo],
) -> Result<MySqlRow> {
    let (storage, values) = match format {
        MySqlValueFormat::Text => {
            let row = TextRow::decode(packet, columns.len())?;
            (row.storage, row.values)
        }

        MySqlValueFormat::Binary => {
            let row = BinaryRow::decode(packet, type_infos)?;
            (row.storage, row.values)
        }
    };

    Ok(MySqlRow {
        storage,
        values,
        format,
        columns: Arc::clone(columns),
        column_names: Arc::clone(column_names),
    })
}

/// Rows of an in-flight result set, pulled one at a time off the socket.
pub struct RowStream<'c> {
    conn: &'c mut MySqlConnection,
    columns: Arc<Vec<MySqlColumn>>,
    column_names: Arc<HashMap<Box<str>, usize>>,
    type_infos: Vec<MySqlTypeInfo>,
    format: MySqlValueFormat,
    affected_rows: u64,
    last_insert_id: u64,
    finished: bool,
}

impl RowStream<'_> {
    pub fn columns(&self) -> &[MySqlColumn] {
        &self.columns
    }

    /// Meaningful once the statement produced no result set (e.g. an
    /// INSERT executed through `fetch`).
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// The next row, or `None` once the result set is exhausted.
    pub async fn try_next(&mut self) -> Result<Option<MySqlRow>> {
        if self.finished {
            return Ok(None);
        }

        match self.recv_row().await {
            Ok(Some(row)) => Ok(Some(row)),

            Ok(None) => {
                self.finished = true;
                self.conn.state = SessionState::Established;

                Ok(None)
            }

            Err(err) => {
                self.finished = true;

                if err.is_fatal_to_connection() {
                    self.conn.force_close().await;
                } else {
                    self.conn.state = SessionState::Established;
                }

                Err(err)
            }
        }
    }

    async fn recv_row(&mut self) -> Result<Option<MySqlRow>> {
        let packet = self.conn.stream.recv_packet().await?;

        if EofPacket::is_eof(&packet) {
            let eof = EofPacket::decode(&packet)?;

            self.conn.in_transaction = eof.status.contains(Status::SERVER_STATUS_IN_TRANS);

            // chained result sets are not streamed; leave them for the drain
            self.conn.stream.busy = if eof.status.contains(Status::SERVER_MORE_RESULTS_EXISTS) {
                Busy::Result
            } else {
                Busy::NotBusy
            };

            return Ok(None);
        }

        if packet[0] == 0xFF {
            self.conn.stream.busy = Busy::NotBusy;
            return Err(Error::Server(ErrPacket::decode(&packet)?.into()));
        }

        Ok(Some(decode_row(
            packet,
            self.format,
            &self.columns,
            &self.column_names,
            &self.type_infos,
        )?))
    }
}

impl Drop for RowStream<'_> {
    fn drop(&mut self) {
        // unread rows stay on the socket; wait_until_ready skips them
        // before the next command
        if !self.finished && self.conn.state == SessionState::AwaitingCommandResponse {
            self.conn.state = SessionState::Established;
        }
    }
}
