use byteorder::LittleEndian;

use crate::error::{err_protocol, Result};
use crate::io::{Buf, BufExt};

/// The wire type code of a column or parameter.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/binary__log__types_8h.html>
/// <https://mariadb.com/kb/en/result-set-packets/#field-types>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    Datetime = 0x0C,
    Year = 0x0D,
    VarChar = 0x0F,
    Bit = 0x10,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl ColumnType {
    pub(crate) fn try_from_u16(id: u16) -> Result<Self> {
        Ok(match id {
            0x00 => ColumnType::Decimal,
            0x01 => ColumnType::Tiny,
            0x02 => ColumnType::Short,
            0x03 => ColumnType::Long,
            0x04 => ColumnType::Float,
            0x05 => ColumnType::Double,
            0x06 => ColumnType::Null,
            0x07 => ColumnType::Timestamp,
            0x08 => ColumnType::LongLong,
            0x09 => ColumnType::Int24,
            0x0A => ColumnType::Date,
            0x0B => ColumnType::Time,
            0x0C => ColumnType::Datetime,
            0x0D => ColumnType::Year,
            0x0F => ColumnType::VarChar,
            0x10 => ColumnType::Bit,
            0xF5 => ColumnType::Json,
            0xF6 => ColumnType::NewDecimal,
            0xF7 => ColumnType::Enum,
            0xF8 => ColumnType::Set,
            0xF9 => ColumnType::TinyBlob,
            0xFA => ColumnType::MediumBlob,
            0xFB => ColumnType::LongBlob,
            0xFC => ColumnType::Blob,
            0xFD => ColumnType::VarString,
            0xFE => ColumnType::String,
            0xFF => ColumnType::Geometry,

            _ => {
                return Err(err_protocol!("unknown column type id: 0x{:02X}", id));
            }
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ColumnType::Decimal | ColumnType::NewDecimal => "DECIMAL",
            ColumnType::Tiny => "TINYINT",
            ColumnType::Short => "SMALLINT",
            ColumnType::Long => "INT",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Null => "NULL",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::LongLong => "BIGINT",
            ColumnType::Int24 => "MEDIUMINT",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Datetime => "DATETIME",
            ColumnType::Year => "YEAR",
            ColumnType::VarChar | ColumnType::VarString => "VARCHAR",
            ColumnType::Bit => "BIT",
            ColumnType::Json => "JSON",
            ColumnType::Enum => "ENUM",
            ColumnType::Set => "SET",
            ColumnType::TinyBlob => "TINYBLOB",
            ColumnType::MediumBlob => "MEDIUMBLOB",
            ColumnType::LongBlob => "LONGBLOB",
            ColumnType::Blob => "BLOB",
            ColumnType::String => "CHAR",
            ColumnType::Geometry => "GEOMETRY",
        }
    }

    /// `true` for the blob family, whose binary-vs-text nature is decided by
    /// the column collation and flags rather than the type code alone.
    pub(crate) fn is_blob(self) -> bool {
        matches!(
            self,
            ColumnType::TinyBlob | ColumnType::MediumBlob | ColumnType::LongBlob | ColumnType::Blob
        )
    }
}

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/group__group__cs__column__definition__flags.html
// https://mariadb.com/kb/en/result-set-packets/#field-details-flag
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u16 {
        /// Field cannot be NULL.
        const NOT_NULL = 1;

        /// Field is part of a primary key.
        const PRIMARY_KEY = 2;

        /// Field is part of a unique key.
        const UNIQUE_KEY = 4;

        /// Field is part of a nonunique key.
        const MULTIPLE_KEY = 8;

        /// Field is a blob.
        const BLOB = 16;

        /// Field is unsigned.
        const UNSIGNED = 32;

        /// Field is zero-filled.
        const ZEROFILL = 64;

        /// Field is binary (set for strings).
        const BINARY = 128;

        /// Field is an enumeration.
        const ENUM = 256;

        /// Field is auto-incremented.
        const AUTO_INCREMENT = 512;

        /// Field is a timestamp.
        const TIMESTAMP = 1024;

        /// Field is a set.
        const SET = 2048;

        /// Field does not have a default value.
        const NO_DEFAULT_VALUE = 4096;

        /// Field is set to NOW on UPDATE.
        const ON_UPDATE_NOW = 8192;

        /// Field is a number.
        const NUM = 32768;
    }
}

/// Describes one output column of a result set.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_query_response_text_resultset_column_definition.html>
/// <https://mariadb.com/kb/en/result-set-packets/#column-definition-packet>
#[derive(Debug, Clone)]
pub(crate) struct ColumnDefinition {
    pub(crate) schema: Box<str>,
    pub(crate) table_alias: Box<str>,
    pub(crate) table: Box<str>,
    pub(crate) column_alias: Box<str>,
    pub(crate) column: Box<str>,
    pub(crate) char_set: u16,
    pub(crate) max_size: u32,
    pub(crate) r#type: ColumnType,
    pub(crate) flags: ColumnFlags,
    pub(crate) decimals: u8,
}

impl ColumnDefinition {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        // catalog : string<lenenc> (always "def")
        let _catalog = buf.get_str_lenenc()?;

        let schema = buf.get_str_lenenc()?.unwrap_or_default().into();
        let table_alias = buf.get_str_lenenc()?.unwrap_or_default().into();
        let table = buf.get_str_lenenc()?.unwrap_or_default().into();
        let column_alias = buf.get_str_lenenc()?.unwrap_or_default().into();
        let column = buf.get_str_lenenc()?.unwrap_or_default().into();

        // length of fixed fields : int<lenenc> (conventionally 0x0C)
        let _len_fixed_fields = buf.get_uint_lenenc()?;

        let char_set = buf.get_u16::<LittleEndian>()?;
        let max_size = buf.get_u32::<LittleEndian>()?;
        let type_id = buf.get_u8()?;
        let flags = ColumnFlags::from_bits_truncate(buf.get_u16::<LittleEndian>()?);
        let decimals = buf.get_u8()?;

        Ok(Self {
            schema,
            table_alias,
            table,
            column_alias,
            column,
            char_set,
            max_size,
            r#type: ColumnType::try_from_u16(type_id.into())?,
            flags,
            decimals,
        })
    }

    /// The name this column is delivered under: its alias, or its
    /// origin column name when no alias was set.
    pub(crate) fn name(&self) -> &str {
        if self.column_alias.is_empty() {
            &self.column
        } else {
            &self.column_alias
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDefinition, ColumnFlags, ColumnType};

    // `SELECT 1 AS test`: a LONGLONG column named "test"
    const COLUMN_DEF_RESULT: &[u8] =
        b"\x03def\x00\x00\x00\x04test\x00\x0c\x3f\x00\x01\x00\x00\x00\x08\x81\x00\x00\x00\x00";

    #[test]
    fn it_decodes_a_column_definition() {
        let def = ColumnDefinition::decode(COLUMN_DEF_RESULT).unwrap();

        assert_eq!(def.name(), "test");
        assert_eq!(def.r#type, ColumnType::LongLong);
        assert_eq!(def.char_set, 63);
        assert!(def.flags.contains(ColumnFlags::NOT_NULL));
        assert_eq!(def.decimals, 0);
    }

    #[test]
    fn it_rejects_an_unknown_type_code() {
        assert!(ColumnType::try_from_u16(0x1C).is_err());
    }
}
