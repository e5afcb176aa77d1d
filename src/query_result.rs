use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::column::MySqlColumn;
use crate::row::MySqlRow;

/// One result set: its column metadata, its materialized rows, and the
/// completion counters from the terminating OK/EOF packet.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub(crate) columns: Arc<Vec<MySqlColumn>>,
    pub(crate) column_names: Arc<HashMap<Box<str>, usize>>,
    pub(crate) rows: Vec<MySqlRow>,
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
}

impl ResultSet {
    pub(crate) fn empty(affected_rows: u64, last_insert_id: u64) -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            column_names: Arc::new(HashMap::new()),
            rows: Vec::new(),
            affected_rows,
            last_insert_id,
        }
    }

    pub fn num_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_of_rows(&self) -> usize {
        self.rows.len()
    }

    /// Rows affected by an INSERT/UPDATE/DELETE; 0 for a SELECT.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// The auto-increment id generated by the statement, if any.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn rows(&self) -> &[MySqlRow] {
        &self.rows
    }

    pub fn cols(&self) -> &[MySqlColumn] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MySqlRow> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a MySqlRow;
    type IntoIter = std::slice::Iter<'a, MySqlRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Everything a statement produced: one result set, or several when the
/// statement text contained multiple statements.
///
/// Dereferences to the first result set, so single-statement callers can
/// use it as if it were one. The sets are stored flat, in arrival order.
#[derive(Debug, Clone)]
pub struct QueryResults {
    pub(crate) sets: Vec<ResultSet>,
}

impl QueryResults {
    /// The result set after `current`, if the statement produced more
    /// than one.
    pub fn next_after(&self, current: usize) -> Option<&ResultSet> {
        self.sets.get(current + 1)
    }

    /// The second result set, if any. Walk further sets with [`sets`][Self::sets].
    pub fn next(&self) -> Option<&ResultSet> {
        self.sets.get(1)
    }

    pub fn sets(&self) -> &[ResultSet] {
        &self.sets
    }

    pub fn num_of_sets(&self) -> usize {
        self.sets.len()
    }
}

impl Deref for QueryResults {
    type Target = ResultSet;

    fn deref(&self) -> &ResultSet {
        // the pipeline always materializes at least one set
        &self.sets[0]
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a ResultSet;
    type IntoIter = std::slice::Iter<'a, ResultSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets.iter()
    }
}
