//! Test helpers: in-memory transports, key fixtures, and a scheme that cannot combine.

use crate::{
    scheme::{context, Bls},
    wire, Scheme,
};
use bytes::Bytes;
use commoncoin_codec::Encode;
use commoncoin_cryptography::{
    bls12381::{dealer::generate_shares, primitives::Error as BlsError},
    Digest,
};
use commoncoin_p2p::Recipients;
use futures::{channel::mpsc, StreamExt};
use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;

/// Returns a scheme for each of `n` participants tolerating `f` faults.
pub fn fixture(seed: u64, n: u32, f: u32) -> Vec<Bls> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (polynomial, shares) = generate_shares(&mut rng, n, f + 1);
    shares
        .into_iter()
        .map(|share| Bls::new(n, polynomial.clone(), share).unwrap())
        .collect()
}

/// Returns the encoded share of `scheme` for `round`.
pub fn share<S: Scheme>(scheme: &S, namespace: &[u8], round: u64) -> Bytes {
    let digest = scheme.hash_message(&context(namespace, round));
    wire::Message::new(round, scheme.sign(&digest))
        .encode()
        .freeze()
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport closed")]
    Closed,
}

/// Records everything sent by the engine.
#[derive(Clone, Debug)]
pub struct Sender {
    sent: mpsc::UnboundedSender<(Recipients, Bytes)>,
}

impl commoncoin_p2p::Sender for Sender {
    type Error = Error;

    async fn send(
        &mut self,
        recipients: Recipients,
        message: Bytes,
        _priority: bool,
    ) -> Result<Vec<u32>, Error> {
        self.sent
            .unbounded_send((recipients, message))
            .map_err(|_| Error::Closed)?;
        Ok(Vec::new())
    }
}

/// Yields whatever the test delivers.
#[derive(Debug)]
pub struct Receiver {
    inbound: mpsc::UnboundedReceiver<(u32, Bytes)>,
}

impl commoncoin_p2p::Receiver for Receiver {
    type Error = Error;

    async fn recv(&mut self) -> Result<(u32, Bytes), Error> {
        self.inbound.next().await.ok_or(Error::Closed)
    }
}

/// The test's end of a mocked transport.
pub struct Transport {
    /// Messages sent by the engine.
    pub sent: mpsc::UnboundedReceiver<(Recipients, Bytes)>,
    /// Messages to deliver to the engine (closing it closes the engine's receiver).
    pub inbound: mpsc::UnboundedSender<(u32, Bytes)>,
}

impl Transport {
    /// Delivers `message` from `sender`.
    pub fn deliver(&self, sender: u32, message: Bytes) {
        self.inbound.unbounded_send((sender, message)).unwrap();
    }
}

/// Returns a connected mock [Sender], [Receiver] and [Transport].
pub fn transport() -> (Sender, Receiver, Transport) {
    let (sent_sender, sent) = mpsc::unbounded();
    let (inbound, inbound_receiver) = mpsc::unbounded();
    (
        Sender { sent: sent_sender },
        Receiver {
            inbound: inbound_receiver,
        },
        Transport { sent, inbound },
    )
}

/// Wraps a scheme so that every combined signature fails verification.
#[derive(Clone, Debug)]
pub struct Broken<S: Scheme>(pub S);

impl<S: Scheme> Scheme for Broken<S> {
    type Partial = S::Partial;
    type Signature = S::Signature;
    type Error = BlsError;

    fn index(&self) -> u32 {
        self.0.index()
    }

    fn threshold(&self) -> u32 {
        self.0.threshold()
    }

    fn participants(&self) -> u32 {
        self.0.participants()
    }

    fn hash_message(&self, context: &[u8]) -> Digest {
        self.0.hash_message(context)
    }

    fn sign(&self, digest: &Digest) -> Self::Partial {
        self.0.sign(digest)
    }

    fn verify_share(
        &self,
        signer: u32,
        digest: &Digest,
        partial: &Self::Partial,
    ) -> Result<(), Self::Error> {
        self.0
            .verify_share(signer, digest, partial)
            .map_err(|_| BlsError::InvalidSignature)
    }

    fn combine<'a, I>(&self, partials: I) -> Result<Self::Signature, Self::Error>
    where
        I: IntoIterator<Item = (u32, &'a Self::Partial)>,
    {
        self.0
            .combine(partials)
            .map_err(|_| BlsError::InvalidSignature)
    }

    fn verify_signature(&self, _: &Digest, _: &Self::Signature) -> Result<(), Self::Error> {
        Err(BlsError::InvalidSignature)
    }
}
