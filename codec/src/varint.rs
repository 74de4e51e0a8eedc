//! Variable-length integer encoding and decoding.
//!
//! Uses LEB128 (the Protocol Buffers varint): each byte carries 7 bits of the value
//! and a continuation bit. Encodings are canonical: a value has exactly one valid
//! encoding and non-minimal encodings are rejected.

use crate::{EncodeSize, Error, Read, Write};
use bytes::{Buf, BufMut};

const DATA_BITS_PER_BYTE: u32 = 7;
const DATA_BITS_MASK: u8 = 0x7F;
const CONTINUATION_BIT_MASK: u8 = 0x80;

/// Encodes a `u64` as a varint.
pub fn write(mut value: u64, buf: &mut impl BufMut) {
    while value >= CONTINUATION_BIT_MASK as u64 {
        buf.put_u8((value as u8 & DATA_BITS_MASK) | CONTINUATION_BIT_MASK);
        value >>= DATA_BITS_PER_BYTE;
    }
    buf.put_u8(value as u8);
}

/// Decodes a `u64` from a varint.
pub fn read(buf: &mut impl Buf) -> Result<u64, Error> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        if !buf.has_remaining() {
            return Err(Error::EndOfBuffer);
        }
        let byte = buf.get_u8();

        // The 10th byte may only carry the single remaining bit.
        if shift == 63 && byte > 1 {
            return Err(Error::InvalidVarint);
        }
        result |= ((byte & DATA_BITS_MASK) as u64) << shift;
        if byte & CONTINUATION_BIT_MASK == 0 {
            // Reject trailing zero bytes (non-canonical).
            if byte == 0 && shift > 0 {
                return Err(Error::InvalidVarint);
            }
            return Ok(result);
        }
        shift += DATA_BITS_PER_BYTE;
    }
}

/// Returns the number of bytes needed to encode `value` as a varint.
pub fn size(value: u64) -> usize {
    let bits = 64 - value.leading_zeros().min(63);
    bits.div_ceil(DATA_BITS_PER_BYTE) as usize
}

/// Wrapper that encodes a `u64` as a varint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UInt(pub u64);

impl From<UInt> for u64 {
    fn from(value: UInt) -> Self {
        value.0
    }
}

impl Write for UInt {
    fn write(&self, buf: &mut impl BufMut) {
        write(self.0, buf);
    }
}

impl Read for UInt {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        read(buf).map(UInt)
    }
}

impl EncodeSize for UInt {
    fn encode_size(&self) -> usize {
        size(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecodeExt, Encode};
    use bytes::Bytes;
    use test_case::test_case;

    #[test_case(0, &[0x00]; "zero")]
    #[test_case(1, &[0x01]; "one")]
    #[test_case(127, &[0x7F]; "max single byte")]
    #[test_case(128, &[0x80, 0x01]; "min two bytes")]
    #[test_case(300, &[0xAC, 0x02]; "three hundred")]
    #[test_case(u64::MAX, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]; "max")]
    fn test_known_encodings(value: u64, expected: &[u8]) {
        let encoded = UInt(value).encode();
        assert_eq!(encoded.as_ref(), expected);
        assert_eq!(size(value), expected.len());
        assert_eq!(UInt::decode(encoded).unwrap(), UInt(value));
    }

    #[test]
    fn test_non_canonical() {
        // 1 encoded with a redundant continuation byte
        let buf = Bytes::from_static(&[0x81, 0x00]);
        assert_eq!(UInt::decode(buf), Err(Error::InvalidVarint));
    }

    #[test]
    fn test_overflow() {
        let buf = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02]);
        assert_eq!(UInt::decode(buf), Err(Error::InvalidVarint));
    }

    #[test]
    fn test_truncated() {
        let buf = Bytes::from_static(&[0x80]);
        assert_eq!(UInt::decode(buf), Err(Error::EndOfBuffer));
    }
}
