//! Per-round collection of verified signature shares.

use crate::scheme::{context, Scheme};
use commoncoin_cryptography::Digest;
use std::collections::{BTreeMap, HashSet};

/// Result of offering a share to the [Ledger].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The share was verified and recorded. Contains the number of shares now held for the round.
    Accepted(usize),
    /// The signer already has a share recorded for the round.
    Duplicate,
    /// The share failed verification.
    Invalid,
    /// The signer is not a participant.
    UnknownSigner,
}

struct Entry<P> {
    digest: Digest,
    signers: HashSet<u32>,
    shares: Vec<(u32, P)>,
}

fn entry<'a, S: Scheme>(
    scheme: &S,
    namespace: &[u8],
    rounds: &'a mut BTreeMap<u64, Entry<S::Partial>>,
    round: u64,
) -> &'a mut Entry<S::Partial> {
    rounds.entry(round).or_insert_with(|| Entry {
        digest: scheme.hash_message(&context(namespace, round)),
        signers: HashSet::new(),
        shares: Vec::new(),
    })
}

/// Verified signature shares for every round referenced so far.
///
/// Rounds are created lazily and retained for the lifetime of the ledger.
pub struct Ledger<S: Scheme> {
    scheme: S,
    namespace: Vec<u8>,
    rounds: BTreeMap<u64, Entry<S::Partial>>,
}

impl<S: Scheme> Ledger<S> {
    pub fn new(scheme: S, namespace: Vec<u8>) -> Self {
        Self {
            scheme,
            namespace,
            rounds: BTreeMap::new(),
        }
    }

    /// Returns the digest signed for `round`.
    pub fn digest(&mut self, round: u64) -> Digest {
        entry(&self.scheme, &self.namespace, &mut self.rounds, round).digest
    }

    /// Offers a share from `signer` for `round`.
    ///
    /// Only verified shares from unseen signers change state. A later share from a signer
    /// never replaces an earlier one.
    pub fn accept(&mut self, round: u64, signer: u32, partial: S::Partial) -> Outcome {
        if signer >= self.scheme.participants() {
            return Outcome::UnknownSigner;
        }
        let entry = entry(&self.scheme, &self.namespace, &mut self.rounds, round);
        if entry.signers.contains(&signer) {
            return Outcome::Duplicate;
        }
        if self.scheme.verify_share(signer, &entry.digest, &partial).is_err() {
            return Outcome::Invalid;
        }
        entry.signers.insert(signer);
        entry.shares.push((signer, partial));
        Outcome::Accepted(entry.shares.len())
    }

    /// Returns the first `count` shares recorded for `round`, in insertion order.
    pub fn select(&self, round: u64, count: usize) -> Vec<(u32, &S::Partial)> {
        self.rounds
            .get(&round)
            .map(|entry| {
                entry
                    .shares
                    .iter()
                    .take(count)
                    .map(|(signer, partial)| (*signer, partial))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of shares recorded for `round`.
    pub fn count(&self, round: u64) -> usize {
        self.rounds
            .get(&round)
            .map_or(0, |entry| entry.shares.len())
    }

    /// Returns the number of rounds tracked.
    pub fn rounds(&self) -> usize {
        self.rounds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::fixture;

    const NAMESPACE: &[u8] = b"ledger";

    #[test]
    fn accept_and_count() {
        let schemes = fixture(0, 4, 1);
        let mut ledger = Ledger::new(schemes[0].clone(), NAMESPACE.to_vec());
        let digest = ledger.digest(0);
        assert_eq!(digest, schemes[0].hash_message(&context(NAMESPACE, 0)));

        assert_eq!(ledger.accept(0, 2, schemes[2].sign(&digest)), Outcome::Accepted(1));
        assert_eq!(ledger.accept(0, 1, schemes[1].sign(&digest)), Outcome::Accepted(2));
        assert_eq!(ledger.accept(0, 3, schemes[3].sign(&digest)), Outcome::Accepted(3));
        assert_eq!(ledger.count(0), 3);

        // Insertion order is preserved
        let selected = ledger
            .select(0, 2)
            .into_iter()
            .map(|(signer, _)| signer)
            .collect::<Vec<_>>();
        assert_eq!(selected, vec![2, 1]);
    }

    #[test]
    fn duplicates_do_not_count() {
        let schemes = fixture(1, 4, 1);
        let mut ledger = Ledger::new(schemes[0].clone(), NAMESPACE.to_vec());
        let digest = ledger.digest(5);
        let partial = schemes[1].sign(&digest);
        assert_eq!(ledger.accept(5, 1, partial.clone()), Outcome::Accepted(1));
        assert_eq!(ledger.accept(5, 1, partial), Outcome::Duplicate);
        assert_eq!(ledger.count(5), 1);
    }

    #[test]
    fn invalid_shares_leave_no_trace() {
        let schemes = fixture(2, 4, 1);
        let mut ledger = Ledger::new(schemes[0].clone(), NAMESPACE.to_vec());
        let digest = ledger.digest(0);
        let wrong_round = ledger.digest(1);

        // Forged (signed over another round)
        let forged = schemes[1].sign(&wrong_round);
        assert_eq!(ledger.accept(0, 1, forged), Outcome::Invalid);
        assert_eq!(ledger.count(0), 0);

        // Claimed by someone else
        let stolen = schemes[2].sign(&digest);
        assert_eq!(ledger.accept(0, 1, stolen), Outcome::Invalid);

        // The real share from the same signer is still accepted
        assert_eq!(
            ledger.accept(0, 1, schemes[1].sign(&digest)),
            Outcome::Accepted(1)
        );
    }

    #[test]
    fn unknown_signers_do_not_create_rounds() {
        let schemes = fixture(3, 4, 1);
        let mut ledger = Ledger::new(schemes[0].clone(), NAMESPACE.to_vec());
        let digest = schemes[0].hash_message(&context(NAMESPACE, 9));
        assert_eq!(
            ledger.accept(9, 4, schemes[1].sign(&digest)),
            Outcome::UnknownSigner
        );
        assert_eq!(ledger.rounds(), 0);
        assert!(ledger.select(9, 2).is_empty());
    }

    #[test]
    fn rounds_are_independent() {
        let schemes = fixture(4, 4, 1);
        let mut ledger = Ledger::new(schemes[0].clone(), NAMESPACE.to_vec());
        let five = ledger.digest(5);
        let zero = ledger.digest(0);
        assert_eq!(ledger.accept(5, 1, schemes[1].sign(&five)), Outcome::Accepted(1));
        assert_eq!(ledger.accept(0, 1, schemes[1].sign(&zero)), Outcome::Accepted(1));

        // A share for one round never verifies for another
        assert_eq!(ledger.accept(5, 2, schemes[2].sign(&zero)), Outcome::Invalid);
        assert_eq!(ledger.rounds(), 2);
    }
}
