//! Error types for codec operations

use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid varint")]
    InvalidVarint,
    #[error("invalid bool")]
    InvalidBool,
    #[error("invalid enum: {0}")]
    InvalidEnum(u8),
    #[error("invalid length: {0}")]
    InvalidLength(usize),
    #[error("invalid data in {0}: {1}")]
    Invalid(&'static str, &'static str), // context, message
}
