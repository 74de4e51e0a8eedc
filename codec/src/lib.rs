//! Serialize structured data.
//!
//! # Overview
//!
//! A small binary serialization library used to move shares between participants
//! and to produce the canonical bytes that coins are derived from. It is designed to:
//! - Serialize structured data into a deterministic binary format
//! - Deserialize untrusted binary input into structured data (never panicking on bad input)
//!
//! # Supported Types
//!
//! Natively supports `u8`, `u16`, `u32`, `u64` (big-endian), `bool`, [bytes::Bytes]
//! (length-prefixed, bounded by a [RangeCfg]), and LEB128 varints via [varint::UInt].
//!
//! # Example
//!
//! ```
//! use bytes::{Buf, BufMut};
//! use commoncoin_codec::{DecodeExt, Encode, EncodeSize, Error, Read, ReadExt, Write};
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: u32,
//!     y: u64,
//! }
//!
//! impl Write for Point {
//!     fn write(&self, buf: &mut impl BufMut) {
//!         self.x.write(buf);
//!         self.y.write(buf);
//!     }
//! }
//!
//! impl Read for Point {
//!     type Cfg = ();
//!
//!     fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
//!         let x = u32::read(buf)?;
//!         let y = u64::read(buf)?;
//!         Ok(Self { x, y })
//!     }
//! }
//!
//! impl EncodeSize for Point {
//!     fn encode_size(&self) -> usize {
//!         self.x.encode_size() + self.y.encode_size()
//!     }
//! }
//!
//! let point = Point { x: 1, y: 2 };
//! let encoded = point.encode();
//! assert_eq!(encoded.len(), 12);
//! assert_eq!(Point::decode(encoded).unwrap(), point);
//! ```

pub mod codec;
pub mod error;
pub mod types;
pub mod varint;

pub use codec::{Decode, DecodeExt, Encode, EncodeSize, FixedSize, Read, ReadExt, Write};
pub use error::Error;
pub use types::RangeCfg;
