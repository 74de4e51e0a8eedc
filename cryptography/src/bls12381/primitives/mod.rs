//! Group elements, polynomials, and signing operations for `(t, n)` threshold BLS.
//!
//! Public keys live in G1 and signatures in G2. A share is the evaluation of a secret polynomial
//! of degree `t-1` at `index + 1`, so any `t` partial signatures over the same message interpolate
//! to the signature of the polynomial's constant term.
//!
//! Scalar and curve arithmetic follows <https://github.com/celo-org/celo-threshold-bls-rs> and
//! <https://github.com/filecoin-project/blstrs>, built on <https://github.com/supranational/blst>.
//!
//! # Example
//!
//! ```rust
//! use commoncoin_cryptography::bls12381::{
//!     dealer::generate_shares,
//!     primitives::{ops, poly},
//! };
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let (polynomial, shares) = generate_shares(&mut rng, 5, 3);
//! let namespace = Some(&b"example"[..]);
//!
//! // Any 3 of 5 shares recover the same signature
//! let partials = shares
//!     .iter()
//!     .map(|share| ops::partial_sign_message(share, namespace, b"round 7"))
//!     .collect::<Vec<_>>();
//! for partial in &partials {
//!     ops::partial_verify_message(&polynomial, namespace, b"round 7", partial).unwrap();
//! }
//! let low = ops::threshold_signature_recover(3, &partials[..3]).unwrap();
//! let high = ops::threshold_signature_recover(3, &partials[2..]).unwrap();
//! assert_eq!(low, high);
//! ops::verify_message(poly::public(&polynomial), namespace, b"round 7", &low).unwrap();
//! ```

pub mod group;
pub mod ops;
pub mod poly;

use thiserror::Error;

/// Errors that can occur when working with BLS12-381 primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("not enough partial signatures: {0}/{1}")]
    NotEnoughPartialSignatures(usize, usize),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("no inverse")]
    NoInverse,
    #[error("duplicate polynomial evaluation point: {0}")]
    DuplicateEval(u32),
}
