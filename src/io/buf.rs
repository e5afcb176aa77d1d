use byteorder::ByteOrder;
use memchr::memchr;
use std::str;

use crate::error::{err_protocol, Result};

/// Checked, advancing reads over a packet payload.
///
/// Every method consumes from the front of the slice; running off the end of
/// the packet is a protocol error, never a panic.
pub trait Buf<'a> {
    fn advance(&mut self, cnt: usize) -> Result<()>;

    fn get_uint<T: ByteOrder>(&mut self, n: usize) -> Result<u64>;

    fn get_i8(&mut self) -> Result<i8>;

    fn get_u8(&mut self) -> Result<u8>;

    fn get_u16<T: ByteOrder>(&mut self) -> Result<u16>;

    fn get_i16<T: ByteOrder>(&mut self) -> Result<i16>;

    fn get_u24<T: ByteOrder>(&mut self) -> Result<u32>;

    fn get_u32<T: ByteOrder>(&mut self) -> Result<u32>;

    fn get_i32<T: ByteOrder>(&mut self) -> Result<i32>;

    fn get_u64<T: ByteOrder>(&mut self) -> Result<u64>;

    fn get_i64<T: ByteOrder>(&mut self) -> Result<i64>;

    fn get_f32<T: ByteOrder>(&mut self) -> Result<f32>;

    fn get_f64<T: ByteOrder>(&mut self) -> Result<f64>;

    fn get_str(&mut self, len: usize) -> Result<&'a str>;

    /// string<NUL>: bytes up to (consuming, but not returning) a NUL terminator.
    fn get_str_nul(&mut self) -> Result<&'a str>;

    /// string<EOF>: the remainder of the packet, as UTF-8.
    fn get_str_eof(&mut self) -> Result<&'a str>;

    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]>;
}

impl<'a> Buf<'a> for &'a [u8] {
    fn advance(&mut self, cnt: usize) -> Result<()> {
        if self.len() < cnt {
            return Err(err_protocol!(
                "unexpected end of packet: wanted {} more bytes but {} remain",
                cnt,
                self.len()
            ));
        }

        *self = &self[cnt..];

        Ok(())
    }

    fn get_uint<T: ByteOrder>(&mut self, n: usize) -> Result<u64> {
        let val = T::read_uint(checked(self, n)?, n);
        *self = &self[n..];

        Ok(val)
    }

    fn get_i8(&mut self) -> Result<i8> {
        Ok(self.get_u8()? as i8)
    }

    fn get_u8(&mut self) -> Result<u8> {
        let val = *self
            .first()
            .ok_or_else(|| err_protocol!("unexpected end of packet: wanted 1 more byte"))?;
        *self = &self[1..];

        Ok(val)
    }

    fn get_u16<T: ByteOrder>(&mut self) -> Result<u16> {
        let val = T::read_u16(checked(self, 2)?);
        *self = &self[2..];

        Ok(val)
    }

    fn get_i16<T: ByteOrder>(&mut self) -> Result<i16> {
        Ok(self.get_u16::<T>()? as i16)
    }

    fn get_u24<T: ByteOrder>(&mut self) -> Result<u32> {
        let val = T::read_u24(checked(self, 3)?);
        *self = &self[3..];

        Ok(val)
    }

    fn get_u32<T: ByteOrder>(&mut self) -> Result<u32> {
        let val = T::read_u32(checked(self, 4)?);
        *self = &self[4..];

        Ok(val)
    }

    fn get_i32<T: ByteOrder>(&mut self) -> Result<i32> {
        Ok(self.get_u32::<T>()? as i32)
    }

    fn get_u64<T: ByteOrder>(&mut self) -> Result<u64> {
        let val = T::read_u64(checked(self, 8)?);
        *self = &self[8..];

        Ok(val)
    }

    fn get_i64<T: ByteOrder>(&mut self) -> Result<i64> {
        Ok(self.get_u64::<T>()? as i64)
    }

    fn get_f32<T: ByteOrder>(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32::<T>()?))
    }

    fn get_f64<T: ByteOrder>(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.get_u64::<T>()?))
    }

    fn get_str(&mut self, len: usize) -> Result<&'a str> {
        str::from_utf8(self.get_bytes(len)?)
            .map_err(|err| err_protocol!("invalid UTF-8 in packet: {}", err))
    }

    fn get_str_nul(&mut self) -> Result<&'a str> {
        let nul = memchr(b'\0', self)
            .ok_or_else(|| err_protocol!("expected NUL-terminated string in packet"))?;

        let s = &self.get_str(nul + 1)?[..nul];

        Ok(s)
    }

    fn get_str_eof(&mut self) -> Result<&'a str> {
        self.get_str(self.len())
    }

    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let buf = checked(self, len)?;
        *self = &self[len..];

        Ok(buf)
    }
}

fn checked<'a>(buf: &&'a [u8], len: usize) -> Result<&'a [u8]> {
    if buf.len() < len {
        return Err(err_protocol!(
            "unexpected end of packet: wanted {} more bytes but {} remain",
            len,
            buf.len()
        ));
    }

    Ok(&buf[..len])
}

#[cfg(test)]
mod tests {
    use super::Buf;
    use byteorder::LittleEndian;

    #[test]
    fn it_reads_fixed_width_integers() {
        let mut buf: &[u8] = &[0x01, 0x34, 0x12, 0x56, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];

        assert_eq!(buf.get_u8().unwrap(), 1);
        assert_eq!(buf.get_u16::<LittleEndian>().unwrap(), 0x1234);
        assert_eq!(buf.get_u24::<LittleEndian>().unwrap(), 0x12_3456);
        assert_eq!(buf.get_u32::<LittleEndian>().unwrap(), 0x1234_5678);
        assert!(buf.is_empty());
    }

    #[test]
    fn it_reads_nul_terminated_strings() {
        let mut buf: &[u8] = b"mysql_native_password\0rest";

        assert_eq!(buf.get_str_nul().unwrap(), "mysql_native_password");
        assert_eq!(buf, b"rest");
    }

    #[test]
    fn it_rejects_short_packets() {
        let mut buf: &[u8] = &[0x01];

        assert!(buf.get_u32::<LittleEndian>().is_err());
    }
}
