use byteorder::LittleEndian;

use crate::error::Result;
use crate::io::{Buf, BufMut};

/// Length-encoded integers and strings.
///
/// The first byte selects the width: values below `0xFB` are stored inline,
/// `0xFC`/`0xFD`/`0xFE` prefix 2/3/8 little-endian bytes, and `0xFB` alone is
/// reserved as the NULL marker inside text result rows.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_dt_integers.html#sect_protocol_basic_dt_int_le>
pub trait BufExt<'a>: Buf<'a> {
    fn get_uint_lenenc(&mut self) -> Result<Option<u64>>;

    fn get_str_lenenc(&mut self) -> Result<Option<&'a str>>;

    fn get_bytes_lenenc(&mut self) -> Result<Option<&'a [u8]>>;
}

impl<'a> BufExt<'a> for &'a [u8] {
    fn get_uint_lenenc(&mut self) -> Result<Option<u64>> {
        Ok(match self.get_u8()? {
            0xFB => None,
            0xFC => Some(u64::from(self.get_u16::<LittleEndian>()?)),
            0xFD => Some(u64::from(self.get_u24::<LittleEndian>()?)),
            0xFE => Some(self.get_u64::<LittleEndian>()?),

            value => Some(u64::from(value)),
        })
    }

    fn get_str_lenenc(&mut self) -> Result<Option<&'a str>> {
        self.get_uint_lenenc()?
            .map(move |len| self.get_str(len as usize))
            .transpose()
    }

    fn get_bytes_lenenc(&mut self) -> Result<Option<&'a [u8]>> {
        self.get_uint_lenenc()?
            .map(move |len| self.get_bytes(len as usize))
            .transpose()
    }
}

pub trait BufMutExt: BufMut {
    fn put_uint_lenenc(&mut self, val: u64);

    fn put_str_lenenc(&mut self, val: &str);

    fn put_bytes_lenenc(&mut self, val: &[u8]);
}

impl BufMutExt for Vec<u8> {
    fn put_uint_lenenc(&mut self, val: u64) {
        if val < 0xFB {
            self.put_u8(val as u8);
        } else if val <= 0xFF_FF {
            self.put_u8(0xFC);
            self.put_u16::<LittleEndian>(val as u16);
        } else if val <= 0xFF_FF_FF {
            self.put_u8(0xFD);
            self.put_u24::<LittleEndian>(val as u32);
        } else {
            self.put_u8(0xFE);
            self.put_u64::<LittleEndian>(val);
        }
    }

    fn put_str_lenenc(&mut self, val: &str) {
        self.put_bytes_lenenc(val.as_bytes());
    }

    fn put_bytes_lenenc(&mut self, val: &[u8]) {
        self.put_uint_lenenc(val.len() as u64);
        self.put_bytes(val);
    }
}

#[cfg(test)]
mod tests {
    use super::{BufExt, BufMutExt};

    fn round_trip(val: u64) -> (usize, u64) {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(val);

        let len = buf.len();
        let mut slice = &buf[..];
        let decoded = slice.get_uint_lenenc().unwrap().unwrap();

        assert!(slice.is_empty());

        (len, decoded)
    }

    #[test]
    fn it_encodes_lenenc_at_width_boundaries() {
        assert_eq!(round_trip(0), (1, 0));
        assert_eq!(round_trip(0xFA), (1, 0xFA));
        assert_eq!(round_trip(0xFB), (3, 0xFB));
        assert_eq!(round_trip(0xFF_FF), (3, 0xFF_FF));
        assert_eq!(round_trip(0x1_00_00), (4, 0x1_00_00));
        assert_eq!(round_trip(0xFF_FF_FF), (4, 0xFF_FF_FF));
        assert_eq!(round_trip(0x1_00_00_00), (9, 0x1_00_00_00));
        assert_eq!(round_trip(u64::MAX), (9, u64::MAX));
    }

    #[test]
    fn it_decodes_null_marker() {
        let mut buf: &[u8] = &[0xFB];

        assert_eq!(buf.get_uint_lenenc().unwrap(), None);
    }

    #[test]
    fn it_decodes_lenenc_strings() {
        let mut buf: &[u8] = b"\x03def\x00";

        assert_eq!(buf.get_str_lenenc().unwrap(), Some("def"));
        assert_eq!(buf.get_str_lenenc().unwrap(), Some(""));
    }
}
