//! Generate threshold keys, sign messages with key shares, and deterministically recover
//! signatures from a threshold of shares.
//!
//! # Status
//!
//! `commoncoin-cryptography` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

pub mod bls12381;
pub mod sha256;
pub use sha256::{hash, Digest, Sha256};
pub mod utils;
