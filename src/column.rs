use crate::protocol::text::ColumnDefinition;
use crate::type_info::MySqlTypeInfo;

/// One output column of a result set.
#[derive(Debug, Clone)]
pub struct MySqlColumn {
    pub(crate) ordinal: usize,
    pub(crate) name: Box<str>,
    pub(crate) type_info: MySqlTypeInfo,
}

impl MySqlColumn {
    pub(crate) fn from_definition(ordinal: usize, def: &ColumnDefinition) -> Self {
        Self {
            ordinal,
            name: def.name().into(),
            type_info: MySqlTypeInfo::from_column(def),
        }
    }

    /// The zero-based position of this column in the result set.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The name the column was delivered under (its alias, if one was set).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &MySqlTypeInfo {
        &self.type_info
    }
}
