use std::ops::Range;

use bytes::Bytes;

use crate::error::{err_protocol, Result};
use crate::io::{Buf, BufExt};
use crate::protocol::text::ColumnType;
use crate::type_info::MySqlTypeInfo;

/// One binary-protocol result row: a `0x00` tag, a NULL bitmap whose bits
/// start at offset 2, and the non-NULL values in column order.
///
/// Cell ranges index into `storage`. Fixed-width values keep their raw
/// little-endian bytes, temporal values keep their 1-byte length prefix, and
/// length-encoded values store the content with the prefix stripped.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_binary_resultset.html#sect_protocol_binary_resultset_row>
#[derive(Debug, Clone)]
pub(crate) struct BinaryRow {
    pub(crate) storage: Bytes,
    pub(crate) values: Vec<Option<Range<usize>>>,
}

impl BinaryRow {
    pub(crate) fn decode(packet: Bytes, columns: &[MySqlTypeInfo]) -> Result<Self> {
        let mut buf: &[u8] = &packet;

        let header = buf.get_u8()?;
        if header != 0x00 {
            return Err(err_protocol!(
                "expected binary row (0x00); received 0x{:02X}",
                header
            ));
        }

        // NULL bitmap : byte<(column_count + 9) / 8>
        let bitmap_len = (columns.len() + 9) / 8;
        let bitmap = buf.get_bytes(bitmap_len)?.to_vec();

        let mut offset = 1 + bitmap_len;
        let mut values = Vec::with_capacity(columns.len());

        for (i, ty) in columns.iter().enumerate() {
            // the first two bits of the bitmap are reserved
            let bit = i + 2;
            if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
                values.push(None);
                continue;
            }

            let range = match ty.r#type {
                ColumnType::Tiny => fixed(&mut buf, &mut offset, 1)?,
                ColumnType::Short | ColumnType::Year => fixed(&mut buf, &mut offset, 2)?,
                ColumnType::Long | ColumnType::Int24 | ColumnType::Float => {
                    fixed(&mut buf, &mut offset, 4)?
                }
                ColumnType::LongLong | ColumnType::Double => fixed(&mut buf, &mut offset, 8)?,

                ColumnType::Date
                | ColumnType::Datetime
                | ColumnType::Timestamp
                | ColumnType::Time => {
                    let len = *buf.first().ok_or_else(|| {
                        err_protocol!("unexpected end of packet in temporal value")
                    })? as usize;

                    fixed(&mut buf, &mut offset, 1 + len)?
                }

                ColumnType::Decimal
                | ColumnType::NewDecimal
                | ColumnType::VarChar
                | ColumnType::VarString
                | ColumnType::String
                | ColumnType::Enum
                | ColumnType::Set
                | ColumnType::Bit
                | ColumnType::TinyBlob
                | ColumnType::MediumBlob
                | ColumnType::LongBlob
                | ColumnType::Blob
                | ColumnType::Geometry
                | ColumnType::Json => {
                    let before = buf.len();
                    let len = buf.get_uint_lenenc()?.ok_or_else(|| {
                        err_protocol!("unexpected NULL marker inside binary row value")
                    })? as usize;

                    let prefix = before - buf.len();
                    buf.advance(len)?;

                    let start = offset + prefix;
                    offset += prefix + len;

                    start..start + len
                }

                ColumnType::Null => {
                    return Err(err_protocol!(
                        "binary row value of unimplemented type {:?}",
                        ty.r#type
                    ));
                }
            };

            values.push(Some(range));
        }

        Ok(Self {
            storage: packet,
            values,
        })
    }
}

fn fixed(buf: &mut &[u8], offset: &mut usize, len: usize) -> Result<Range<usize>> {
    buf.advance(len)?;

    let start = *offset;
    *offset += len;

    Ok(start..start + len)
}

#[cfg(test)]
mod tests {
    use super::BinaryRow;
    use crate::protocol::text::{ColumnFlags, ColumnType};
    use crate::type_info::MySqlTypeInfo;
    use bytes::Bytes;

    fn ty(t: ColumnType) -> MySqlTypeInfo {
        MySqlTypeInfo {
            r#type: t,
            flags: ColumnFlags::empty(),
            char_set: 45,
            max_size: 0,
        }
    }

    #[test]
    fn it_decodes_mixed_fixed_and_lenenc_cells() {
        // row: INT 5, NULL (VARCHAR), "ok"
        // bitmap bit for column 1 is at byte 0, bit 3
        let packet = Bytes::from_static(b"\x00\x08\x05\x00\x00\x00\x02ok");
        let columns = [
            ty(ColumnType::Long),
            ty(ColumnType::VarString),
            ty(ColumnType::VarString),
        ];

        let row = BinaryRow::decode(packet, &columns).unwrap();

        assert_eq!(&row.storage[row.values[0].clone().unwrap()], b"\x05\x00\x00\x00");
        assert_eq!(row.values[1], None);
        assert_eq!(&row.storage[row.values[2].clone().unwrap()], b"ok");
    }

    #[test]
    fn it_keeps_the_temporal_length_prefix() {
        // DATETIME 2010-10-17 19:27:30
        let packet = Bytes::from_static(b"\x00\x00\x07\xda\x07\x0a\x11\x13\x1b\x1e");
        let columns = [ty(ColumnType::Datetime)];

        let row = BinaryRow::decode(packet, &columns).unwrap();

        assert_eq!(
            &row.storage[row.values[0].clone().unwrap()],
            b"\x07\xda\x07\x0a\x11\x13\x1b\x1e"
        );
    }

    #[test]
    fn it_rejects_a_bad_row_tag() {
        let columns = [ty(ColumnType::Long)];

        assert!(BinaryRow::decode(Bytes::from_static(b"\x01\x00\x00"), &columns).is_err());
    }
}
