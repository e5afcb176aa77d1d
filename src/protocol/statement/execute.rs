use byteorder::LittleEndian;

use crate::arguments::MySqlArguments;
use crate::io::BufMut;
use crate::protocol::{Capabilities, Encode};

/// Executes a prepared statement with bound parameters.
///
/// Parameter values travel in the binary protocol: a NULL bitmap, the
/// `new-params-bound` flag, one (type, flags) pair per parameter, and the
/// encoded values of every non-NULL parameter in order.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_com_stmt_execute.html>
#[derive(Debug)]
pub(crate) struct Execute<'a> {
    pub(crate) statement_id: u32,
    pub(crate) arguments: &'a MySqlArguments,
}

impl Encode for Execute<'_> {
    fn encode(&self, buf: &mut Vec<u8>, _: Capabilities) {
        // COM_STMT_EXECUTE : int<1>
        buf.put_u8(0x17);

        // statement id : int<4>
        buf.put_u32::<LittleEndian>(self.statement_id);

        // flags (no cursor) : int<1>
        buf.put_u8(0);

        // iteration count (always 1) : int<4>
        buf.put_u32::<LittleEndian>(1);

        if !self.arguments.types.is_empty() {
            // NULL bitmap : byte<(param_count + 7) / 8>
            buf.put_bytes(&self.arguments.null_bitmap);

            // new params bound flag : int<1>
            buf.put_u8(1);

            for (ty, unsigned) in &self.arguments.types {
                // parameter type : int<1>
                buf.put_u8(*ty as u8);

                // parameter flags : int<1>
                buf.put_u8(if *unsigned { 0x80 } else { 0 });
            }

            // values of non-NULL parameters : byte<n>
            buf.put_bytes(&self.arguments.values);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Encode, Execute};
    use crate::arguments::MySqlArguments;
    use crate::protocol::Capabilities;
    use crate::value::Value;

    #[test]
    fn it_encodes_an_execute_without_parameters() {
        let arguments = MySqlArguments::default();

        let mut buf = Vec::new();
        Execute {
            statement_id: 2,
            arguments: &arguments,
        }
        .encode(&mut buf, Capabilities::empty());

        assert_eq!(buf, b"\x17\x02\x00\x00\x00\x00\x01\x00\x00\x00");
    }

    #[test]
    fn it_encodes_null_bitmap_and_types() {
        let arguments =
            MySqlArguments::from_values(&[Value::Null, Value::Int(5), Value::Null]).unwrap();

        let mut buf = Vec::new();
        Execute {
            statement_id: 1,
            arguments: &arguments,
        }
        .encode(&mut buf, Capabilities::empty());

        // header (10 bytes), then the bitmap: params 0 and 2 are NULL
        assert_eq!(buf[10], 0b0000_0101);

        // new-params-bound flag
        assert_eq!(buf[11], 1);

        // three (type, flags) pairs followed by the single TINY value
        assert_eq!(buf.len(), 12 + 6 + 1);
        assert_eq!(*buf.last().unwrap(), 5);
    }
}
