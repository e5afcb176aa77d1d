use std::ops::Range;

use bytes::Bytes;

use crate::error::{err_protocol, Result};
use crate::io::{Buf, BufExt};

/// One text-protocol result row: per column, either the NULL marker `0xFB`
/// or a length-encoded byte string.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_query_response_text_resultset_row.html>
#[derive(Debug, Clone)]
pub(crate) struct TextRow {
    pub(crate) storage: Bytes,

    /// Content range of each cell within `storage`; `None` for NULL.
    pub(crate) values: Vec<Option<Range<usize>>>,
}

impl TextRow {
    pub(crate) fn decode(packet: Bytes, columns: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(columns);
        let mut buf: &[u8] = &packet;
        let mut offset = 0;

        for _ in 0..columns {
            if buf.first() == Some(&0xFB) {
                buf.advance(1)?;
                offset += 1;

                values.push(None);
                continue;
            }

            let before = buf.len();
            let len = buf
                .get_uint_lenenc()?
                .ok_or_else(|| err_protocol!("unexpected NULL marker inside lenenc prefix"))?
                as usize;

            let prefix = before - buf.len();
            buf.advance(len)?;

            values.push(Some(offset + prefix..offset + prefix + len));
            offset += prefix + len;
        }

        if !buf.is_empty() {
            return Err(err_protocol!(
                "result row has {} trailing bytes after {} columns",
                buf.len(),
                columns
            ));
        }

        Ok(Self {
            storage: packet,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TextRow;
    use bytes::Bytes;

    #[test]
    fn it_decodes_a_text_row() {
        // "1", NULL, "abc"
        let row = TextRow::decode(Bytes::from_static(b"\x011\xfb\x03abc"), 3).unwrap();

        assert_eq!(row.values.len(), 3);
        assert_eq!(&row.storage[row.values[0].clone().unwrap()], b"1");
        assert_eq!(row.values[1], None);
        assert_eq!(&row.storage[row.values[2].clone().unwrap()], b"abc");
    }

    #[test]
    fn it_rejects_trailing_bytes() {
        assert!(TextRow::decode(Bytes::from_static(b"\x011\x011"), 1).is_err());
    }

    #[test]
    fn it_rejects_truncated_cells() {
        assert!(TextRow::decode(Bytes::from_static(b"\x05ab"), 1).is_err());
    }
}
