//! Core traits for encoding and decoding.

use crate::error::Error;
use bytes::{Buf, BufMut, BytesMut};

/// Trait for types that can be written (encoded) to a buffer.
pub trait Write {
    /// Encodes this value by writing to a buffer.
    ///
    /// Implementations should panic if the buffer doesn't have enough capacity.
    fn write(&self, buf: &mut impl BufMut);
}

/// Trait for types that know the exact length of their encoding.
pub trait EncodeSize {
    /// Returns the number of bytes [Write::write] will produce.
    fn encode_size(&self) -> usize;
}

/// Trait for types that can be read (decoded) from a buffer.
pub trait Read: Sized {
    /// Configuration used to bound decoding of untrusted input (e.g. maximum lengths).
    type Cfg: Clone + Send + Sync + 'static;

    /// Reads a value from the buffer using the provided configuration, consuming the
    /// necessary bytes.
    fn read_cfg(buf: &mut impl Buf, cfg: &Self::Cfg) -> Result<Self, Error>;
}

/// Trait for types with a known, fixed encoded length.
pub trait FixedSize {
    /// The length of the encoded value.
    const SIZE: usize;
}

impl<T: FixedSize> EncodeSize for T {
    fn encode_size(&self) -> usize {
        Self::SIZE
    }
}

/// Trait for types that can be encoded into a fresh buffer.
pub trait Encode: Write + EncodeSize {
    /// Encodes a value to a `BytesMut` buffer.
    ///
    /// Panics if `write` does not write exactly `encode_size` bytes.
    fn encode(&self) -> BytesMut {
        let len = self.encode_size();
        let mut buf = BytesMut::with_capacity(len);
        self.write(&mut buf);
        assert_eq!(buf.len(), len, "write() did not write expected bytes");
        buf
    }
}

impl<T: Write + EncodeSize> Encode for T {}

/// Trait for types that can be decoded from a buffer that must be fully consumed.
pub trait Decode: Read {
    /// Decodes a value, returning [Error::ExtraData] if any bytes are left over.
    fn decode_cfg(mut buf: impl Buf, cfg: &Self::Cfg) -> Result<Self, Error> {
        let value = Self::read_cfg(&mut buf, cfg)?;
        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }
        Ok(value)
    }
}

impl<T: Read> Decode for T {}

/// Convenience trait for types that read without configuration.
pub trait ReadExt: Read<Cfg = ()> {
    /// Reads a value using the default `()` config.
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Self::read_cfg(buf, &())
    }
}

impl<T: Read<Cfg = ()>> ReadExt for T {}

/// Convenience trait for types that decode without configuration.
pub trait DecodeExt: Decode<Cfg = ()> {
    /// Decodes a value using the default `()` config.
    fn decode(buf: impl Buf) -> Result<Self, Error> {
        Self::decode_cfg(buf, &())
    }
}

impl<T: Decode<Cfg = ()>> DecodeExt for T {}

/// Returns [Error::EndOfBuffer] if `buf` holds fewer than `len` bytes.
#[inline]
pub(crate) fn at_least(buf: &impl Buf, len: usize) -> Result<(), Error> {
    if buf.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    Ok(())
}
