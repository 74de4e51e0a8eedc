//! Threshold signature schemes used to produce coins.
//!
//! A [Scheme] holds the group's public key material and one participant's key share.
//! [Bls] implements it with BLS12-381 threshold signatures.

use crate::Error;
use commoncoin_codec::{EncodeSize, Read, Write};
use commoncoin_cryptography::{
    bls12381::{
        dealer::evaluate_all,
        primitives::{
            group::{self, Share},
            ops,
            poly::{self, Eval},
            Error as BlsError,
        },
    },
    sha256,
    utils::union_unique,
    Digest,
};
use std::fmt::Debug;

/// Returns the canonical context signed for a given `round`.
///
/// The context is the length-prefixed `namespace` followed by the big-endian round.
pub fn context(namespace: &[u8], round: u64) -> Vec<u8> {
    union_unique(namespace, &round.to_be_bytes())
}

/// A `(k, l)` threshold signature scheme, held by a single participant.
pub trait Scheme: Clone + Send + Sync + 'static {
    /// A signature share produced by a single participant.
    type Partial: Read<Cfg = ()> + Write + EncodeSize + Clone + Debug + Send + Sync + 'static;

    /// A signature recovered from `k` shares.
    type Signature: Write + EncodeSize + Clone + Debug + Send + Sync + 'static;

    /// Error returned when a share or signature fails verification.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Index of the share held by this participant.
    fn index(&self) -> u32;

    /// Number of shares required to recover a signature (`k`).
    fn threshold(&self) -> u32;

    /// Number of shareholders (`l`).
    fn participants(&self) -> u32;

    /// Canonicalizes a context into a signable digest.
    fn hash_message(&self, context: &[u8]) -> Digest;

    /// Signs a digest with the local share.
    fn sign(&self, digest: &Digest) -> Self::Partial;

    /// Verifies a share produced by `signer` over a digest.
    fn verify_share(
        &self,
        signer: u32,
        digest: &Digest,
        partial: &Self::Partial,
    ) -> Result<(), Self::Error>;

    /// Combines at least `k` shares from distinct signers into a signature.
    fn combine<'a, I>(&self, partials: I) -> Result<Self::Signature, Self::Error>
    where
        I: IntoIterator<Item = (u32, &'a Self::Partial)>;

    /// Verifies a combined signature over a digest.
    fn verify_signature(
        &self,
        digest: &Digest,
        signature: &Self::Signature,
    ) -> Result<(), Self::Error>;
}

/// BLS12-381 threshold signatures (public keys in G1, signatures in G2).
#[derive(Clone, Debug)]
pub struct Bls {
    polynomial: poly::Public,
    identities: Vec<group::Public>,
    share: Share,
}

impl Bls {
    /// Creates a scheme for the holder of `share` among `participants` shareholders.
    ///
    /// Returns [Error::InvalidConfig] if the share does not belong to `polynomial`.
    pub fn new(participants: u32, polynomial: poly::Public, share: Share) -> Result<Self, Error> {
        if polynomial.required() > participants {
            return Err(Error::InvalidConfig(format!(
                "threshold {} exceeds participants {}",
                polynomial.required(),
                participants
            )));
        }
        if share.index >= participants {
            return Err(Error::InvalidConfig(format!(
                "share index {} out of range for {} participants",
                share.index, participants
            )));
        }
        let identities = evaluate_all(&polynomial, participants)
            .into_iter()
            .map(|eval| eval.value)
            .collect::<Vec<_>>();
        if identities[share.index as usize] != share.public() {
            return Err(Error::InvalidConfig(format!(
                "share {} does not match polynomial",
                share.index
            )));
        }
        Ok(Self {
            polynomial,
            identities,
            share,
        })
    }

    /// Returns the group public key.
    pub fn identity(&self) -> &group::Public {
        poly::public(&self.polynomial)
    }
}

impl Scheme for Bls {
    type Partial = group::Signature;
    type Signature = group::Signature;
    type Error = BlsError;

    fn index(&self) -> u32 {
        self.share.index
    }

    fn threshold(&self) -> u32 {
        self.polynomial.required()
    }

    fn participants(&self) -> u32 {
        self.identities.len() as u32
    }

    fn hash_message(&self, context: &[u8]) -> Digest {
        sha256::hash(context)
    }

    fn sign(&self, digest: &Digest) -> Self::Partial {
        ops::partial_sign_message(&self.share, None, digest).value
    }

    fn verify_share(
        &self,
        signer: u32,
        digest: &Digest,
        partial: &Self::Partial,
    ) -> Result<(), Self::Error> {
        let public = self
            .identities
            .get(signer as usize)
            .ok_or(BlsError::InvalidSignature)?;
        ops::verify_message(public, None, digest, partial)
    }

    fn combine<'a, I>(&self, partials: I) -> Result<Self::Signature, Self::Error>
    where
        I: IntoIterator<Item = (u32, &'a Self::Partial)>,
    {
        let evals = partials
            .into_iter()
            .map(|(index, value)| Eval {
                index,
                value: *value,
            })
            .collect::<Vec<_>>();
        ops::threshold_signature_recover(self.threshold(), &evals)
    }

    fn verify_signature(
        &self,
        digest: &Digest,
        signature: &Self::Signature,
    ) -> Result<(), Self::Error> {
        ops::verify_message(self.identity(), None, digest, signature)
    }
}
