use byteorder::LittleEndian;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::Result;
use crate::io::{BufMut, BufMutExt};
use crate::protocol::text::ColumnType;
use crate::value::Value;

/// Parameters bound to one `COM_STMT_EXECUTE`, already in wire form: the
/// inferred (type, unsigned) pair per parameter, the NULL bitmap, and the
/// concatenated binary encodings of every non-NULL value.
#[derive(Debug, Default)]
pub struct MySqlArguments {
    pub(crate) types: Vec<(ColumnType, bool)>,
    pub(crate) null_bitmap: Vec<u8>,
    pub(crate) values: Vec<u8>,
}

impl MySqlArguments {
    pub(crate) fn from_values(values: &[Value]) -> Result<Self> {
        let mut arguments = MySqlArguments::default();

        for value in values {
            arguments.add(value)?;
        }

        Ok(arguments)
    }

    fn add(&mut self, value: &Value) -> Result<()> {
        let index = self.types.len();
        self.null_bitmap.resize(index / 8 + 1, 0);

        let (ty, unsigned) = match value {
            Value::Null => {
                self.null_bitmap[index / 8] |= 1 << (index % 8);

                (ColumnType::Null, false)
            }

            Value::Bool(b) => {
                self.values.put_u8(u8::from(*b));

                (ColumnType::Tiny, false)
            }

            Value::Int(v) => {
                let v = *v;

                if i8::try_from(v).is_ok() {
                    self.values.put_i8(v as i8);
                    (ColumnType::Tiny, false)
                } else if i16::try_from(v).is_ok() {
                    self.values.put_i16::<LittleEndian>(v as i16);
                    (ColumnType::Short, false)
                } else if i32::try_from(v).is_ok() {
                    self.values.put_i32::<LittleEndian>(v as i32);
                    (ColumnType::Long, false)
                } else {
                    self.values.put_i64::<LittleEndian>(v);
                    (ColumnType::LongLong, false)
                }
            }

            Value::UInt(v) => {
                let v = *v;

                if u8::try_from(v).is_ok() {
                    self.values.put_u8(v as u8);
                    (ColumnType::Tiny, true)
                } else if u16::try_from(v).is_ok() {
                    self.values.put_u16::<LittleEndian>(v as u16);
                    (ColumnType::Short, true)
                } else if u32::try_from(v).is_ok() {
                    self.values.put_u32::<LittleEndian>(v as u32);
                    (ColumnType::Long, true)
                } else {
                    self.values.put_u64::<LittleEndian>(v);
                    (ColumnType::LongLong, true)
                }
            }

            Value::Double(v) => {
                self.values.put_f64::<LittleEndian>(*v);

                (ColumnType::Double, false)
            }

            Value::Text(s) => {
                self.values.put_str_lenenc(s);

                (ColumnType::VarString, false)
            }

            Value::Bytes(b) => {
                self.values.put_bytes_lenenc(b);

                (blob_type_for(b.len()), false)
            }

            // date-only values still bind as DATETIME; the 4-byte short
            // form carries no time fields
            Value::Date(d) => {
                encode_date(&mut self.values, *d);

                (ColumnType::Datetime, false)
            }

            Value::DateTime(dt) => {
                encode_datetime(&mut self.values, *dt);

                (ColumnType::Datetime, false)
            }
        };

        self.types.push((ty, unsigned));

        Ok(())
    }
}

fn blob_type_for(len: usize) -> ColumnType {
    if len <= 0xFF {
        ColumnType::TinyBlob
    } else if len <= 0xFF_FF {
        ColumnType::MediumBlob
    } else if len <= 0xFF_FF_FF {
        ColumnType::LongBlob
    } else {
        ColumnType::Blob
    }
}

// year : int<2> LE, month : int<1>, day : int<1>
fn encode_date(buf: &mut Vec<u8>, date: NaiveDate) {
    buf.put_u8(4);
    buf.put_u16::<LittleEndian>(date.year().clamp(0, 9999) as u16);
    buf.put_u8(date.month() as u8);
    buf.put_u8(date.day() as u8);
}

fn encode_datetime(buf: &mut Vec<u8>, dt: NaiveDateTime) {
    let micros = dt.and_utc().timestamp_subsec_micros();

    // shortest of the 4 / 7 / 11 byte forms that loses nothing
    let len: u8 = if micros != 0 {
        11
    } else if dt.hour() != 0 || dt.minute() != 0 || dt.second() != 0 {
        7
    } else {
        4
    };

    buf.put_u8(len);
    buf.put_u16::<LittleEndian>(dt.year().clamp(0, 9999) as u16);
    buf.put_u8(dt.month() as u8);
    buf.put_u8(dt.day() as u8);

    if len >= 7 {
        buf.put_u8(dt.hour() as u8);
        buf.put_u8(dt.minute() as u8);
        buf.put_u8(dt.second() as u8);
    }

    if len == 11 {
        buf.put_u32::<LittleEndian>(micros);
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, MySqlArguments};
    use crate::value::Value;

    #[test]
    fn it_infers_integer_widths() {
        let args = MySqlArguments::from_values(&[
            Value::Int(5),
            Value::Int(-129),
            Value::Int(40_000),
            Value::Int(5_000_000_000),
        ])
        .unwrap();

        assert_eq!(
            args.types,
            [
                (ColumnType::Tiny, false),
                (ColumnType::Short, false),
                (ColumnType::Long, false),
                (ColumnType::LongLong, false),
            ]
        );

        assert_eq!(args.values.len(), 1 + 2 + 4 + 8);
    }

    #[test]
    fn it_marks_unsigned_parameters() {
        let args = MySqlArguments::from_values(&[Value::UInt(300)]).unwrap();

        assert_eq!(args.types, [(ColumnType::Short, true)]);
    }

    #[test]
    fn it_sets_null_bits_without_emitting_bytes() {
        let args =
            MySqlArguments::from_values(&[Value::Null, Value::Text("x".into()), Value::Null])
                .unwrap();

        assert_eq!(args.null_bitmap, [0b0000_0101]);
        assert_eq!(args.values, b"\x01x");
    }

    #[test]
    fn it_widens_the_bitmap_past_eight_parameters() {
        let values: Vec<Value> = (0..9).map(|_| Value::Null).collect();
        let args = MySqlArguments::from_values(&values).unwrap();

        assert_eq!(args.null_bitmap, [0xFF, 0x01]);
    }

    #[test]
    fn it_classifies_blobs_by_length() {
        let small = MySqlArguments::from_values(&[Value::Bytes(vec![0; 10])]).unwrap();
        let medium = MySqlArguments::from_values(&[Value::Bytes(vec![0; 300])]).unwrap();

        assert_eq!(small.types, [(ColumnType::TinyBlob, false)]);
        assert_eq!(medium.types, [(ColumnType::MediumBlob, false)]);
    }

    #[test]
    fn it_encodes_datetimes_in_the_shortest_form() {
        let args = MySqlArguments::from_values(&[Value::DateTime(
            "2010-10-17T19:27:30".parse().unwrap(),
        )])
        .unwrap();

        // test values from https://dev.mysql.com/doc/internals/en/binary-protocol-value.html
        assert_eq!(args.values, b"\x07\xda\x07\x0a\x11\x13\x1b\x1e");
    }

    #[test]
    fn it_tags_date_only_values_as_datetime() {
        let args =
            MySqlArguments::from_values(&[Value::Date("2010-10-17".parse().unwrap())]).unwrap();

        assert_eq!(args.types, [(ColumnType::Datetime, false)]);
        assert_eq!(args.values, b"\x04\xda\x07\x0a\x11");
    }

    #[test]
    fn it_encodes_bools_as_tiny() {
        let args = MySqlArguments::from_values(&[Value::Bool(true)]).unwrap();

        assert_eq!(args.types, [(ColumnType::Tiny, false)]);
        assert_eq!(args.values, [1]);
    }
}
