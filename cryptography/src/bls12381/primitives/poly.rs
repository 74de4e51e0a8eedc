//! Polynomials over the BLS12-381 scalar field and their commitments.
//!
//! A dealer samples a private [Poly] of degree `t - 1`, hands out evaluations
//! at `index + 1` as shares and publishes the commitment (a [Public] polynomial
//! over G1). Any `t` evaluations are sufficient to recover the constant term.

use crate::bls12381::primitives::{
    group::{self, Element, Scalar},
    Error,
};
use bytes::{Buf, BufMut};
use commoncoin_codec::{EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, Write};
use rand::RngCore;
use std::collections::HashSet;

/// Private polynomials are used to generate secret shares.
pub type Private = Poly<group::Private>;

/// Public polynomials represent commitments to secrets on a private polynomial.
pub type Public = Poly<group::Public>;

/// Signature polynomials are used in threshold signing (where a signature
/// is interpolated using at least `threshold` evaluations).
pub type Signature = Poly<group::Signature>;

/// A partial signature produced by a single share (G2).
pub type PartialSignature = Eval<group::Signature>;

/// The length of an encoded [PartialSignature].
pub const PARTIAL_SIGNATURE_LENGTH: usize = u32::SIZE + group::SIGNATURE_LENGTH;

/// A polynomial evaluation at a specific index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eval<C: Element> {
    pub index: u32,
    pub value: C,
}

impl<C: Element> Write for Eval<C> {
    fn write(&self, buf: &mut impl BufMut) {
        self.index.write(buf);
        self.value.write(buf);
    }
}

impl<C: Element> Read for Eval<C> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let index = u32::read(buf)?;
        let value = C::read(buf)?;
        Ok(Self { index, value })
    }
}

impl<C: Element> FixedSize for Eval<C> {
    const SIZE: usize = u32::SIZE + C::SIZE;
}

/// A polynomial whose variable is a scalar and whose coefficients are
/// elements of some group.
#[derive(Debug, Clone, PartialEq, Eq)]
// Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L24-L28
pub struct Poly<C>(Vec<C>);

/// Returns a new scalar polynomial of the given degree with coefficients
/// sampled from the provided RNG.
///
/// In the context of secret sharing, the threshold is the degree + 1.
pub fn new_from<R: RngCore>(degree: u32, rng: &mut R) -> Poly<Scalar> {
    let coeffs = (0..=degree).map(|_| Scalar::rand(rng)).collect::<Vec<_>>();
    Poly(coeffs)
}

impl<C> Poly<C> {
    /// Creates a new polynomial from the given coefficients.
    pub fn from(c: Vec<C>) -> Self {
        Self(c)
    }

    /// Returns the constant term of the polynomial.
    pub fn constant(&self) -> &C {
        &self.0[0]
    }

    /// Returns the degree of the polynomial.
    pub fn degree(&self) -> u32 {
        (self.0.len() - 1) as u32
    }

    /// Returns the number of evaluations required to recover the constant term.
    pub fn required(&self) -> u32 {
        self.0.len() as u32
    }
}

impl<C: Element> Poly<C> {
    /// Commits a scalar polynomial to the group by multiplying each
    /// coefficient with the generator.
    pub fn commit(commits: Poly<Scalar>) -> Self {
        let commits = commits
            .0
            .iter()
            .map(|c| {
                let mut commitment = C::one();
                commitment.mul(c);
                commitment
            })
            .collect::<Vec<C>>();
        Poly::<C>::from(commits)
    }

    /// Evaluates the polynomial at `index + 1`.
    ///
    /// The polynomial is never evaluated at zero, which would reveal the secret.
    pub fn evaluate(&self, index: u32) -> Eval<C> {
        let xi = Scalar::from_index(index);

        // Horner's method
        let value = self.0.iter().rev().fold(C::zero(), |mut sum, coeff| {
            sum.mul(&xi);
            sum.add(coeff);
            sum
        });
        Eval { index, value }
    }

    /// Recovers the constant term of a polynomial of degree less than `t`
    /// from at least `t` evaluations.
    ///
    /// Evaluations are sorted by index and the first `t` are interpolated at
    /// `x = 0`, so any two calls over the same set select the same points.
    /// Duplicate indices are rejected.
    pub fn recover<'a, I>(t: u32, evals: I) -> Result<C, Error>
    where
        C: 'a,
        I: IntoIterator<Item = &'a Eval<C>>,
    {
        // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L131-L165
        let t = t as usize;
        let mut evals = evals.into_iter().collect::<Vec<_>>();
        if evals.len() < t {
            return Err(Error::NotEnoughPartialSignatures(t, evals.len()));
        }
        let mut seen = HashSet::with_capacity(evals.len());
        for eval in &evals {
            if !seen.insert(eval.index) {
                return Err(Error::DuplicateEval(eval.index));
            }
        }
        evals.sort_by_key(|e| e.index);
        let xs = evals
            .into_iter()
            .take(t)
            .map(|e| (e.index, Scalar::from_index(e.index), &e.value))
            .collect::<Vec<_>>();

        // sum_i yi * l_i(0) where l_i(0) = prod_{j != i} xj / (xj - xi)
        xs.iter().try_fold(C::zero(), |mut acc, (i, xi, yi)| {
            let mut num = Scalar::one();
            let mut den = Scalar::one();
            for (j, xj, _) in &xs {
                if i == j {
                    continue;
                }
                num.mul(xj);
                let mut diff = *xj;
                diff.sub(xi);
                den.mul(&diff);
            }
            let inv = den.inverse().ok_or(Error::NoInverse)?;
            num.mul(&inv);

            let mut scaled = **yi;
            scaled.mul(&num);
            acc.add(&scaled);
            Ok(acc)
        })
    }
}

impl<C: Element> Write for Poly<C> {
    fn write(&self, buf: &mut impl BufMut) {
        for c in &self.0 {
            c.write(buf);
        }
    }
}

impl<C: Element> Read for Poly<C> {
    /// The number of coefficients (the threshold).
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, expected: &usize) -> Result<Self, CodecError> {
        if *expected == 0 {
            return Err(CodecError::InvalidLength(0));
        }
        let expected_size = C::SIZE * (*expected);
        if buf.remaining() < expected_size {
            return Err(CodecError::EndOfBuffer);
        }
        let mut coeffs = Vec::with_capacity(*expected);
        for _ in 0..*expected {
            coeffs.push(C::read(buf)?);
        }
        Ok(Self(coeffs))
    }
}

impl<C: Element> EncodeSize for Poly<C> {
    fn encode_size(&self) -> usize {
        C::SIZE * self.0.len()
    }
}

/// Returns the group public key of a commitment (its constant term).
pub fn public(public: &Public) -> &group::Public {
    public.constant()
}
