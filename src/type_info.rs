use std::fmt::{self, Display, Formatter};

use crate::protocol::text::{ColumnDefinition, ColumnFlags, ColumnType};

/// Type information for a MySQL column: the wire type code, the column
/// flags, the collation, and the declared length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlTypeInfo {
    pub(crate) r#type: ColumnType,
    pub(crate) flags: ColumnFlags,
    pub(crate) char_set: u16,
    pub(crate) max_size: u32,
}

/// The collation id reserved for raw binary data.
pub(crate) const COLLATE_BINARY: u16 = 63;

impl MySqlTypeInfo {
    pub(crate) fn from_column(def: &ColumnDefinition) -> Self {
        Self {
            r#type: def.r#type,
            flags: def.flags,
            char_set: def.char_set,
            max_size: def.max_size,
        }
    }

    /// The SQL name of this type, e.g. `BIGINT` or `VARCHAR`.
    pub fn name(&self) -> &'static str {
        self.r#type.name()
    }

    /// Whether values of this column are opaque bytes rather than text.
    ///
    /// `GEOMETRY` and `BIT` always are; the blob family is binary when the
    /// column carries the binary collation or the BINARY flag. Everything
    /// else is delivered as text.
    pub fn is_binary(&self) -> bool {
        match self.r#type {
            ColumnType::Geometry | ColumnType::Bit => true,

            _ if self.r#type.is_blob() => {
                self.char_set == COLLATE_BINARY || self.flags.contains(ColumnFlags::BINARY)
            }

            _ => false,
        }
    }

    pub(crate) fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED)
    }

    /// `TINYINT(1)`, the conventional boolean column.
    pub(crate) fn is_bool(&self) -> bool {
        self.r#type == ColumnType::Tiny && self.max_size == 1
    }
}

impl Display for MySqlTypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnFlags, ColumnType, MySqlTypeInfo, COLLATE_BINARY};

    fn info(r#type: ColumnType, flags: ColumnFlags, char_set: u16) -> MySqlTypeInfo {
        MySqlTypeInfo {
            r#type,
            flags,
            char_set,
            max_size: 0,
        }
    }

    #[test]
    fn geometry_and_bit_are_always_binary() {
        assert!(info(ColumnType::Geometry, ColumnFlags::empty(), 45).is_binary());
        assert!(info(ColumnType::Bit, ColumnFlags::empty(), 45).is_binary());
    }

    #[test]
    fn blobs_are_binary_by_collation_or_flag() {
        assert!(info(ColumnType::Blob, ColumnFlags::empty(), COLLATE_BINARY).is_binary());
        assert!(info(ColumnType::TinyBlob, ColumnFlags::BINARY, 45).is_binary());

        // a TEXT column is a blob on the wire with a textual collation
        assert!(!info(ColumnType::Blob, ColumnFlags::empty(), 45).is_binary());
    }

    #[test]
    fn varchar_is_textual() {
        assert!(!info(ColumnType::VarString, ColumnFlags::BINARY, 45).is_binary());
    }
}
