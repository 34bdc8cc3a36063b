//! Length-encoded integers and the low-level payload read helpers built on
//! them.
//!
//! MySQL's variable-width unsigned integer: a lead byte below 0xFB is the
//! value itself; 0xFC, 0xFD and 0xFE prefix a little-endian u16, u24 and u64.
//! 0xFB never encodes an integer — in row payloads it marks a NULL cell, which
//! the row parser handles before calling into this module.

use bytes::{Buf, BufMut, BytesMut};

use crate::Error;

/// The lead byte that marks a NULL cell in a textual row payload.
pub(crate) const NULL_CELL: u8 = 0xFB;

pub(crate) fn read_u64(buf: &mut impl Buf) -> crate::Result<u64> {
    if !buf.has_remaining() {
        return Err(truncated());
    }

    match buf.get_u8() {
        lead @ 0x00..=0xFA => Ok(u64::from(lead)),
        0xFC => {
            ensure_remaining(buf, 2)?;
            Ok(u64::from(buf.get_u16_le()))
        }
        0xFD => {
            ensure_remaining(buf, 3)?;
            Ok(buf.get_uint_le(3))
        }
        0xFE => {
            ensure_remaining(buf, 8)?;
            Ok(buf.get_u64_le())
        }
        lead => Err(Error::Protocol(
            format!("invalid length-encoded integer lead byte 0x{:02x}", lead).into(),
        )),
    }
}

/// Writes `value` using the minimum applicable width.
pub(crate) fn write_u64(buf: &mut impl BufMut, value: u64) {
    if value < 0xFB {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u8(0xFC);
        buf.put_u16_le(value as u16);
    } else if value <= 0xFF_FFFF {
        buf.put_u8(0xFD);
        buf.put_uint_le(value, 3);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(value);
    }
}

/// The number of bytes `write_u64` produces for `value`.
pub(crate) fn encoded_len(value: u64) -> usize {
    if value < 0xFB {
        1
    } else if value <= 0xFFFF {
        3
    } else if value <= 0xFF_FFFF {
        4
    } else {
        9
    }
}

/// Reads a length-encoded byte string.
pub(crate) fn read_bytes(buf: &mut BytesMut) -> crate::Result<BytesMut> {
    let length = read_u64(buf)? as usize;
    take(buf, length)
}

/// Reads a length-encoded string as UTF-8.
pub(crate) fn read_string(buf: &mut BytesMut) -> crate::Result<String> {
    let bytes = read_bytes(buf)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Splits off exactly `length` bytes or fails with a protocol error.
pub(crate) fn take(buf: &mut BytesMut, length: usize) -> crate::Result<BytesMut> {
    if buf.len() < length {
        return Err(truncated());
    }
    Ok(buf.split_to(length))
}

/// Reads up to the next NUL byte, consuming the terminator.
pub(crate) fn read_null_terminated(buf: &mut BytesMut) -> crate::Result<BytesMut> {
    match buf.iter().position(|byte| *byte == 0) {
        Some(index) => {
            let bytes = buf.split_to(index);
            buf.advance(1);
            Ok(bytes)
        }
        None => Err(Error::Protocol("missing NUL terminator".into())),
    }
}

/// Reads a NUL-terminated UTF-8 string.
pub(crate) fn read_null_terminated_string(buf: &mut BytesMut) -> crate::Result<String> {
    let bytes = read_null_terminated(buf)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

pub(crate) fn read_u8(buf: &mut impl Buf) -> crate::Result<u8> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn read_u16_le(buf: &mut impl Buf) -> crate::Result<u16> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16_le())
}

pub(crate) fn read_u32_le(buf: &mut impl Buf) -> crate::Result<u32> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32_le())
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> crate::Result<()> {
    if buf.remaining() < needed {
        return Err(truncated());
    }
    Ok(())
}

fn truncated() -> Error {
    Error::Protocol("truncated payload".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: u64) -> u64 {
        let mut buf = BytesMut::new();
        write_u64(&mut buf, value);
        assert_eq!(encoded_len(value), buf.len());
        let decoded = read_u64(&mut buf).unwrap();
        assert!(buf.is_empty());
        decoded
    }

    #[test]
    fn roundtrip_boundaries() {
        for value in [
            0,
            1,
            0xFA,
            0xFB,
            0xFC,
            0xFF,
            0xFFFF,
            0x1_0000,
            0xFF_FFFF,
            0x100_0000,
            u64::from(u32::MAX),
            u64::MAX,
        ] {
            assert_eq!(value, roundtrip(value));
        }
    }

    #[test]
    fn minimum_widths() {
        assert_eq!(1, encoded_len(0));
        assert_eq!(1, encoded_len(0xFA));
        assert_eq!(3, encoded_len(0xFB));
        assert_eq!(3, encoded_len(0xFFFF));
        assert_eq!(4, encoded_len(0x1_0000));
        assert_eq!(4, encoded_len(0xFF_FFFF));
        assert_eq!(9, encoded_len(0x100_0000));
        assert_eq!(9, encoded_len(u64::MAX));
    }

    #[test]
    fn lead_byte_0xfb_is_not_an_integer() {
        let mut buf = BytesMut::from(&[0xFBu8][..]);
        assert!(read_u64(&mut buf).is_err());
    }

    #[test]
    fn lead_byte_0xff_is_invalid() {
        let mut buf = BytesMut::from(&[0xFFu8][..]);
        assert!(read_u64(&mut buf).is_err());
    }

    #[test]
    fn truncated_wide_integer_fails() {
        let mut buf = BytesMut::from(&[0xFCu8, 0x01][..]);
        assert!(read_u64(&mut buf).is_err());
    }

    #[test]
    fn read_string_roundtrip() {
        let mut buf = BytesMut::new();
        write_u64(&mut buf, 5);
        buf.extend_from_slice(b"hello");
        assert_eq!("hello", read_string(&mut buf).unwrap());
    }

    #[test]
    fn null_terminated_string() {
        let mut buf = BytesMut::from(&b"5.7.29-log\0rest"[..]);
        assert_eq!("5.7.29-log", read_null_terminated_string(&mut buf).unwrap());
        assert_eq!(&b"rest"[..], &buf[..]);
    }

    #[test]
    fn null_terminated_without_terminator_fails() {
        let mut buf = BytesMut::from(&b"no-nul"[..]);
        assert!(read_null_terminated(&mut buf).is_err());
    }
}
