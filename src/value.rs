use std::fmt::Write as _;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{err_protocol, Error, Result};
use crate::protocol::text::ColumnType;
use crate::type_info::MySqlTypeInfo;

/// Whether a cell arrived via the text or the binary protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MySqlValueFormat {
    Text,
    Binary,
}

/// A dynamically typed value: a statement parameter, or a decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as a string, when it holds text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as raw bytes, when it holds text or bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int(v.into())
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt(v.into())
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A single cell of a result row, borrowed from the row's storage.
///
/// Conversions follow the column type: asking for a conversion the column
/// type does not support fails with a protocol error rather than guessing.
#[derive(Debug, Clone, Copy)]
pub struct MySqlValue<'r> {
    pub(crate) data: Option<&'r [u8]>,
    pub(crate) format: MySqlValueFormat,
    pub(crate) type_info: &'r MySqlTypeInfo,
}

impl<'r> MySqlValue<'r> {
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn type_info(&self) -> &MySqlTypeInfo {
        self.type_info
    }

    /// The raw bytes of the cell: text-protocol cells as received, binary
    /// string cells without their length prefix, fixed-width cells as their
    /// little-endian encoding.
    pub fn as_bytes(&self) -> Option<&'r [u8]> {
        self.data
    }

    /// A UTF-8 view of a textual cell.
    pub fn as_str(&self) -> Result<Option<&'r str>> {
        if self.type_info.is_binary() {
            return Err(self.bad_conversion("string"));
        }

        if self.format == MySqlValueFormat::Binary && !is_string_like(self.type_info.r#type) {
            return Err(self.bad_conversion("borrowed string"));
        }

        self.data
            .map(|data| {
                std::str::from_utf8(data)
                    .map_err(|err| err_protocol!("column holds invalid UTF-8: {}", err))
            })
            .transpose()
    }

    /// `TINYINT(1)` as a boolean: `0` is false, anything else is true.
    pub fn to_bool(&self) -> Result<Option<bool>> {
        if !self.type_info.is_bool() {
            return Err(self.bad_conversion("boolean"));
        }

        Ok(self.to_i64()?.map(|v| v != 0))
    }

    pub fn to_i64(&self) -> Result<Option<i64>> {
        if !is_integer(self.type_info.r#type) {
            return Err(self.bad_conversion("integer"));
        }

        let Some(data) = self.data else {
            return Ok(None);
        };

        let v = match self.format {
            MySqlValueFormat::Text => atoi::atoi::<i64>(data)
                .ok_or_else(|| err_protocol!("malformed integer cell: {:?}", data))?,

            MySqlValueFormat::Binary => {
                if self.type_info.is_unsigned() {
                    let raw = read_unsigned(self.type_info.r#type, data)?;

                    i64::try_from(raw)
                        .map_err(|_| err_protocol!("unsigned value {} overflows i64", raw))?
                } else {
                    read_signed(self.type_info.r#type, data)?
                }
            }
        };

        Ok(Some(v))
    }

    pub fn to_u64(&self) -> Result<Option<u64>> {
        if !is_integer(self.type_info.r#type) {
            return Err(self.bad_conversion("unsigned integer"));
        }

        let Some(data) = self.data else {
            return Ok(None);
        };

        let v = match self.format {
            MySqlValueFormat::Text => atoi::atoi::<u64>(data)
                .ok_or_else(|| err_protocol!("malformed integer cell: {:?}", data))?,

            MySqlValueFormat::Binary => {
                if self.type_info.is_unsigned() {
                    read_unsigned(self.type_info.r#type, data)?
                } else {
                    let raw = read_signed(self.type_info.r#type, data)?;

                    u64::try_from(raw)
                        .map_err(|_| err_protocol!("negative value {} has no u64 form", raw))?
                }
            }
        };

        Ok(Some(v))
    }

    pub fn to_f64(&self) -> Result<Option<f64>> {
        let ty = self.type_info.r#type;
        if !is_integer(ty) && !matches!(ty, ColumnType::Float | ColumnType::Double) {
            return Err(self.bad_conversion("floating point"));
        }

        let Some(data) = self.data else {
            return Ok(None);
        };

        let v = match self.format {
            MySqlValueFormat::Text => std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| err_protocol!("malformed numeric cell: {:?}", data))?,

            MySqlValueFormat::Binary => match ty {
                ColumnType::Float => {
                    expect_len(data, 4)?;
                    f64::from(f32::from_bits(LittleEndian::read_u32(data)))
                }
                ColumnType::Double => {
                    expect_len(data, 8)?;
                    f64::from_bits(LittleEndian::read_u64(data))
                }
                _ => {
                    if self.type_info.is_unsigned() {
                        read_unsigned(ty, data)? as f64
                    } else {
                        read_signed(ty, data)? as f64
                    }
                }
            },
        };

        Ok(Some(v))
    }

    pub fn to_datetime(&self) -> Result<Option<NaiveDateTime>> {
        if !matches!(
            self.type_info.r#type,
            ColumnType::Date | ColumnType::Datetime | ColumnType::Timestamp
        ) {
            return Err(self.bad_conversion("date-time"));
        }

        let Some(data) = self.data else {
            return Ok(None);
        };

        let v = match self.format {
            MySqlValueFormat::Text => {
                let s = std::str::from_utf8(data)
                    .map_err(|err| err_protocol!("malformed temporal cell: {}", err))?;

                if self.type_info.r#type == ColumnType::Date {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map_err(|err| err_protocol!("malformed DATE {:?}: {}", s, err))?
                        .and_time(NaiveTime::MIN)
                } else {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .map_err(|err| err_protocol!("malformed DATETIME {:?}: {}", s, err))?
                }
            }

            MySqlValueFormat::Binary => decode_binary_datetime(data)?,
        };

        Ok(Some(v))
    }

    /// The cell as its raw string-or-bytes form: opaque columns yield
    /// [`Value::Bytes`], everything else a string (binary-protocol scalars
    /// are rendered in their decimal ASCII form).
    pub fn to_raw(&self) -> Value {
        let Some(data) = self.data else {
            return Value::Null;
        };

        if self.type_info.is_binary() {
            return Value::Bytes(data.to_vec());
        }

        match self.format {
            MySqlValueFormat::Text => Value::Text(String::from_utf8_lossy(data).into_owned()),
            MySqlValueFormat::Binary => match self.to_native() {
                Ok(Value::Text(s)) => Value::Text(s),
                Ok(Value::Bytes(b)) => Value::Bytes(b),
                Ok(Value::Null) => Value::Null,
                Ok(v) => Value::Text(render_scalar(&v)),
                Err(_) => Value::Bytes(data.to_vec()),
            },
        }
    }

    /// The cell as the best-fitting native value for its column type.
    pub fn to_native(&self) -> Result<Value> {
        let Some(data) = self.data else {
            return Ok(Value::Null);
        };

        if self.type_info.is_binary() {
            return Ok(Value::Bytes(data.to_vec()));
        }

        let ty = self.type_info.r#type;

        Ok(if self.type_info.is_bool() {
            Value::Bool(self.to_i64()?.unwrap_or(0) != 0)
        } else if is_integer(ty) {
            if self.type_info.is_unsigned() {
                Value::UInt(self.to_u64()?.unwrap_or(0))
            } else {
                Value::Int(self.to_i64()?.unwrap_or(0))
            }
        } else if matches!(ty, ColumnType::Float | ColumnType::Double) {
            Value::Double(self.to_f64()?.unwrap_or(0.0))
        } else if matches!(ty, ColumnType::Datetime | ColumnType::Timestamp) {
            match self.to_datetime()? {
                Some(dt) => Value::DateTime(dt),
                // zero dates have no native representation
                None => Value::Null,
            }
        } else if ty == ColumnType::Date {
            match self.to_datetime()? {
                Some(dt) => Value::Date(dt.date()),
                None => Value::Null,
            }
        } else if ty == ColumnType::Time && self.format == MySqlValueFormat::Binary {
            Value::Text(render_binary_time(data)?)
        } else {
            // DECIMAL stays textual to preserve precision
            Value::Text(String::from_utf8_lossy(data).into_owned())
        })
    }

    fn bad_conversion(&self, target: &str) -> Error {
        err_protocol!(
            "cannot convert a {} column to {}",
            self.type_info.name(),
            target
        )
    }
}

fn is_integer(ty: ColumnType) -> bool {
    matches!(
        ty,
        ColumnType::Tiny
            | ColumnType::Short
            | ColumnType::Long
            | ColumnType::LongLong
            | ColumnType::Int24
            | ColumnType::Year
    )
}

fn is_string_like(ty: ColumnType) -> bool {
    matches!(
        ty,
        ColumnType::VarChar
            | ColumnType::VarString
            | ColumnType::String
            | ColumnType::Enum
            | ColumnType::Set
            | ColumnType::Decimal
            | ColumnType::NewDecimal
            | ColumnType::Json
    ) || ty.is_blob()
}

fn expect_len(data: &[u8], len: usize) -> Result<()> {
    if data.len() != len {
        return Err(err_protocol!(
            "cell is {} bytes but its type encodes as {}",
            data.len(),
            len
        ));
    }

    Ok(())
}

fn read_signed(ty: ColumnType, data: &[u8]) -> Result<i64> {
    Ok(match ty {
        ColumnType::Tiny => {
            expect_len(data, 1)?;
            (data[0] as i8).into()
        }
        ColumnType::Short | ColumnType::Year => {
            expect_len(data, 2)?;
            LittleEndian::read_i16(data).into()
        }
        ColumnType::Long | ColumnType::Int24 => {
            expect_len(data, 4)?;
            LittleEndian::read_i32(data).into()
        }
        ColumnType::LongLong => {
            expect_len(data, 8)?;
            LittleEndian::read_i64(data)
        }
        _ => unreachable!("caller checked for an integer type"),
    })
}

fn read_unsigned(ty: ColumnType, data: &[u8]) -> Result<u64> {
    Ok(match ty {
        ColumnType::Tiny => {
            expect_len(data, 1)?;
            data[0].into()
        }
        ColumnType::Short | ColumnType::Year => {
            expect_len(data, 2)?;
            LittleEndian::read_u16(data).into()
        }
        ColumnType::Long | ColumnType::Int24 => {
            expect_len(data, 4)?;
            LittleEndian::read_u32(data).into()
        }
        ColumnType::LongLong => {
            expect_len(data, 8)?;
            LittleEndian::read_u64(data)
        }
        _ => unreachable!("caller checked for an integer type"),
    })
}

// length-prefixed DATE / DATETIME / TIMESTAMP value; length 0 is the
// zero date, which has no chrono representation
fn decode_binary_datetime(data: &[u8]) -> Result<NaiveDateTime> {
    let len = *data
        .first()
        .ok_or_else(|| err_protocol!("empty temporal cell"))? as usize;

    if data.len() != len + 1 || !matches!(len, 0 | 4 | 7 | 11) {
        return Err(err_protocol!("malformed temporal cell of length {}", len));
    }

    if len == 0 {
        return Err(err_protocol!("zero date has no native representation"));
    }

    let date = NaiveDate::from_ymd_opt(
        i32::from(LittleEndian::read_u16(&data[1..])),
        u32::from(data[3]),
        u32::from(data[4]),
    )
    .ok_or_else(|| err_protocol!("temporal cell holds an impossible date"))?;

    let (hour, min, sec) = if len >= 7 {
        (data[5].into(), data[6].into(), data[7].into())
    } else {
        (0, 0, 0)
    };

    let micros = if len == 11 {
        LittleEndian::read_u32(&data[8..])
    } else {
        0
    };

    date.and_hms_micro_opt(hour, min, sec, micros)
        .ok_or_else(|| err_protocol!("temporal cell holds an impossible time"))
}

// length-prefixed TIME value rendered in MySQL's text form
fn render_binary_time(data: &[u8]) -> Result<String> {
    let len = *data
        .first()
        .ok_or_else(|| err_protocol!("empty temporal cell"))? as usize;

    if data.len() != len + 1 || !matches!(len, 0 | 8 | 12) {
        return Err(err_protocol!("malformed TIME cell of length {}", len));
    }

    if len == 0 {
        return Ok("00:00:00".to_owned());
    }

    let negative = data[1] != 0;
    let days = LittleEndian::read_u32(&data[2..]);
    let hours = u64::from(days) * 24 + u64::from(data[6]);

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    let _ = write!(out, "{:02}:{:02}:{:02}", hours, data[7], data[8]);

    if len == 12 {
        let micros = LittleEndian::read_u32(&data[9..]);
        let _ = write!(out, ".{:06}", micros);
    }

    Ok(out)
}

fn render_scalar(v: &Value) -> String {
    match v {
        Value::Bool(b) => if *b { "1" } else { "0" }.to_owned(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Value::Text(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bytes(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{MySqlValue, MySqlValueFormat, Value};
    use crate::protocol::text::{ColumnFlags, ColumnType};
    use crate::type_info::MySqlTypeInfo;

    fn info(r#type: ColumnType, flags: ColumnFlags, max_size: u32) -> MySqlTypeInfo {
        MySqlTypeInfo {
            r#type,
            flags,
            char_set: 45,
            max_size,
        }
    }

    fn text<'r>(data: &'r [u8], ti: &'r MySqlTypeInfo) -> MySqlValue<'r> {
        MySqlValue {
            data: Some(data),
            format: MySqlValueFormat::Text,
            type_info: ti,
        }
    }

    #[test]
    fn text_cells_parse_integers() {
        let ti = info(ColumnType::LongLong, ColumnFlags::empty(), 20);

        assert_eq!(text(b"-42", &ti).to_i64().unwrap(), Some(-42));
        assert_eq!(text(b"42", &ti).to_u64().unwrap(), Some(42));
    }

    #[test]
    fn tiny1_converts_to_bool() {
        let ti = info(ColumnType::Tiny, ColumnFlags::empty(), 1);

        assert_eq!(text(b"0", &ti).to_bool().unwrap(), Some(false));
        assert_eq!(text(b"1", &ti).to_bool().unwrap(), Some(true));

        // a wider TINYINT is not a boolean
        let wide = info(ColumnType::Tiny, ColumnFlags::empty(), 4);
        assert!(text(b"1", &wide).to_bool().is_err());
    }

    #[test]
    fn varchar_does_not_convert_to_integer() {
        let ti = info(ColumnType::VarString, ColumnFlags::empty(), 80);

        assert!(text(b"42", &ti).to_i64().is_err());
        assert_eq!(text(b"42", &ti).as_str().unwrap(), Some("42"));
    }

    #[test]
    fn binary_int_cells_read_little_endian() {
        let ti = info(ColumnType::Long, ColumnFlags::empty(), 11);
        let v = MySqlValue {
            data: Some(b"\xfe\xff\xff\xff"),
            format: MySqlValueFormat::Binary,
            type_info: &ti,
        };

        assert_eq!(v.to_i64().unwrap(), Some(-2));
    }

    #[test]
    fn binary_datetime_decodes() {
        let ti = info(ColumnType::Datetime, ColumnFlags::empty(), 19);
        let v = MySqlValue {
            // 2010-10-17 19:27:30
            data: Some(b"\x07\xda\x07\x0a\x11\x13\x1b\x1e"),
            format: MySqlValueFormat::Binary,
            type_info: &ti,
        };

        let dt = v.to_datetime().unwrap().unwrap();
        assert_eq!(dt.to_string(), "2010-10-17 19:27:30");
    }

    #[test]
    fn text_datetime_parses_fractional_seconds() {
        let ti = info(ColumnType::Timestamp, ColumnFlags::empty(), 26);
        let v = text(b"2010-10-17 19:27:30.000001", &ti);

        let dt = v.to_datetime().unwrap().unwrap();
        assert_eq!(dt.and_utc().timestamp_subsec_micros(), 1);
    }

    #[test]
    fn null_cells_convert_to_none() {
        let ti = info(ColumnType::Long, ColumnFlags::empty(), 11);
        let v = MySqlValue {
            data: None,
            format: MySqlValueFormat::Text,
            type_info: &ti,
        };

        assert!(v.is_null());
        assert_eq!(v.to_i64().unwrap(), None);
        assert_eq!(v.to_native().unwrap(), Value::Null);
    }

    #[test]
    fn opaque_cells_stay_opaque() {
        let ti = MySqlTypeInfo {
            r#type: ColumnType::Blob,
            flags: ColumnFlags::BINARY,
            char_set: 63,
            max_size: 0,
        };
        let v = text(&[0x01, 0x02, 0x03], &ti);

        assert!(v.as_str().is_err());
        assert_eq!(v.to_native().unwrap(), Value::Bytes(vec![1, 2, 3]));
    }
}
