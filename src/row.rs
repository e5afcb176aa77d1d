use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::column::MySqlColumn;
use crate::error::{Error, Result};
use crate::value::{MySqlValue, MySqlValueFormat, Value};

/// A single row of a result set.
///
/// Cells can be addressed by zero-based position or by column name
/// (case-insensitively).
#[derive(Debug, Clone)]
pub struct MySqlRow {
    pub(crate) storage: Bytes,
    pub(crate) values: Vec<Option<Range<usize>>>,
    pub(crate) format: MySqlValueFormat,
    pub(crate) columns: Arc<Vec<MySqlColumn>>,
    pub(crate) column_names: Arc<HashMap<Box<str>, usize>>,
}

/// Either a zero-based column position or a (case-insensitive) column name.
pub trait RowIndex {
    fn resolve(&self, row: &MySqlRow) -> Result<usize>;
}

impl RowIndex for usize {
    fn resolve(&self, row: &MySqlRow) -> Result<usize> {
        if *self >= row.values.len() {
            return Err(Error::ColumnIndexOutOfBounds {
                index: *self,
                len: row.values.len(),
            });
        }

        Ok(*self)
    }
}

impl RowIndex for &str {
    fn resolve(&self, row: &MySqlRow) -> Result<usize> {
        row.column_names
            .get(self.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| Error::ColumnNotFound((*self).into()))
    }
}

impl MySqlRow {
    /// Number of cells in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[MySqlColumn] {
        &self.columns
    }

    /// The cell at `index`, ready for typed conversion.
    pub fn get<I: RowIndex>(&self, index: I) -> Result<MySqlValue<'_>> {
        let index = index.resolve(self)?;

        Ok(MySqlValue {
            data: self.values[index]
                .as_ref()
                .map(|range| &self.storage[range.clone()]),
            format: self.format,
            type_info: &self.columns[index].type_info,
        })
    }

    pub fn get_str<I: RowIndex>(&self, index: I) -> Result<Option<&str>> {
        self.get(index)?.as_str()
    }

    pub fn get_bytes<I: RowIndex>(&self, index: I) -> Result<Option<&[u8]>> {
        Ok(self.get(index)?.as_bytes())
    }

    pub fn get_bool<I: RowIndex>(&self, index: I) -> Result<Option<bool>> {
        self.get(index)?.to_bool()
    }

    pub fn get_i64<I: RowIndex>(&self, index: I) -> Result<Option<i64>> {
        self.get(index)?.to_i64()
    }

    pub fn get_u64<I: RowIndex>(&self, index: I) -> Result<Option<u64>> {
        self.get(index)?.to_u64()
    }

    pub fn get_f64<I: RowIndex>(&self, index: I) -> Result<Option<f64>> {
        self.get(index)?.to_f64()
    }

    pub fn get_datetime<I: RowIndex>(&self, index: I) -> Result<Option<NaiveDateTime>> {
        self.get(index)?.to_datetime()
    }

    /// The row as a column-name → raw-value map: strings for textual
    /// columns, bytes for opaque ones. With duplicate column names, the
    /// later column wins.
    pub fn assoc(&self) -> HashMap<String, Value> {
        let mut map = HashMap::with_capacity(self.columns.len());

        for (index, column) in self.columns.iter().enumerate() {
            let value = self
                .get(index)
                .map(|cell| cell.to_raw())
                .unwrap_or(Value::Null);

            map.insert(column.name().to_owned(), value);
        }

        map
    }

    /// The row as a column-name → best-native-value map.
    pub fn typed_assoc(&self) -> Result<HashMap<String, Value>> {
        let mut map = HashMap::with_capacity(self.columns.len());

        for (index, column) in self.columns.iter().enumerate() {
            map.insert(column.name().to_owned(), self.get(index)?.to_native()?);
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::{MySqlRow, MySqlValueFormat, Value};
    use crate::column::MySqlColumn;
    use crate::protocol::text::{ColumnFlags, ColumnType};
    use crate::type_info::MySqlTypeInfo;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sample_row() -> MySqlRow {
        let columns = vec![
            MySqlColumn {
                ordinal: 0,
                name: "Id".into(),
                type_info: MySqlTypeInfo {
                    r#type: ColumnType::LongLong,
                    flags: ColumnFlags::NOT_NULL,
                    char_set: 63,
                    max_size: 20,
                },
            },
            MySqlColumn {
                ordinal: 1,
                name: "name".into(),
                type_info: MySqlTypeInfo {
                    r#type: ColumnType::VarString,
                    flags: ColumnFlags::empty(),
                    char_set: 45,
                    max_size: 80,
                },
            },
        ];

        let mut column_names = HashMap::new();
        for (i, c) in columns.iter().enumerate() {
            column_names.insert(c.name().to_ascii_lowercase().into_boxed_str(), i);
        }

        MySqlRow {
            storage: Bytes::from_static(b"7ana"),
            values: vec![Some(0..1), Some(1..4)],
            format: MySqlValueFormat::Text,
            columns: Arc::new(columns),
            column_names: Arc::new(column_names),
        }
    }

    #[test]
    fn it_reads_cells_by_position_and_name() {
        let row = sample_row();

        assert_eq!(row.get_i64(0).unwrap(), Some(7));
        assert_eq!(row.get_str("name").unwrap(), Some("ana"));

        // lookup is case-insensitive
        assert_eq!(row.get_i64("ID").unwrap(), Some(7));
    }

    #[test]
    fn it_rejects_unknown_columns() {
        let row = sample_row();

        assert!(row.get_str("missing").is_err());
        assert!(row.get_str(9).is_err());
    }

    #[test]
    fn assoc_maps_by_delivered_name() {
        let row = sample_row();
        let map = row.assoc();

        assert_eq!(map["Id"], Value::Text("7".into()));
        assert_eq!(map["name"], Value::Text("ana".into()));
    }

    #[test]
    fn typed_assoc_uses_native_types() {
        let row = sample_row();
        let map = row.typed_assoc().unwrap();

        assert_eq!(map["Id"], Value::Int(7));
        assert_eq!(map["name"], Value::Text("ana".into()));
    }
}
