//! LEB128 variable-length integers used for string lengths and record framing.

use bytes::{Buf, BufMut};
use std::io::{self, Read};

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn put_varint(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint from a buffer. `None` if the buffer ends mid-value or the
/// encoding is longer than ten bytes.
pub fn get_varint(buf: &mut impl Buf) -> Option<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        if !buf.has_remaining() {
            return None;
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

/// Decode a varint from a stream.
///
/// Returns `Ok(None)` on a clean end of stream before the first byte; an end
/// of stream inside the value is `UnexpectedEof`.
pub fn read_varint(reader: &mut impl Read) -> io::Result<Option<u64>> {
    let mut value = 0u64;
    let mut byte = [0u8; 1];
    for (i, shift) in (0..64).step_by(7).enumerate() {
        if reader.read(&mut byte)? == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a length prefix",
            ));
        }
        value |= ((byte[0] & 0x7F) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "length prefix is longer than ten bytes",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len_matches_output() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            put_varint(&mut buf, value);
            assert_eq!(buf.len(), encoded_len(value));
            assert_eq!(get_varint(&mut &buf[..]), Some(value));
        }
    }

    #[test]
    fn test_truncated_varint() {
        assert_eq!(get_varint(&mut &[0x80u8, 0x80][..]), None);
        let mut reader = &[0x80u8][..];
        assert!(read_varint(&mut reader).is_err());
        let mut empty: &[u8] = &[];
        assert!(read_varint(&mut empty).unwrap().is_none());
    }
}
