//! Trusted-dealer generation of threshold key shares.
//!
//! The dealer knows the group secret. This is suitable for tests and demos where
//! all participants trust a single setup process.

use crate::bls12381::primitives::{
    group::{Public, Share},
    poly,
};
use rand::RngCore;

/// Generates a commitment to a random polynomial of degree `t - 1` and `n` shares of it.
///
/// Share `i` is the evaluation of the secret polynomial at `i + 1`.
///
/// # Panics
///
/// Panics if `t == 0` or `t > n`.
pub fn generate_shares<R: RngCore>(rng: &mut R, n: u32, t: u32) -> (poly::Public, Vec<Share>) {
    assert!(t > 0 && t <= n, "invalid threshold: t={t} n={n}");

    // Generate a secret polynomial and commit to it
    let secret = poly::new_from(t - 1, rng);
    let commitment = poly::Public::commit(secret.clone());
    let shares = (0..n)
        .map(|i| {
            let eval = secret.evaluate(i);
            Share {
                index: eval.index,
                private: eval.value,
            }
        })
        .collect::<Vec<_>>();
    (commitment, shares)
}

/// Evaluates the public polynomial at each of the `n` indices.
pub fn evaluate_all(polynomial: &poly::Public, n: u32) -> Vec<poly::Eval<Public>> {
    (0..n).map(|i| polynomial.evaluate(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls12381::primitives::poly::public;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn shares_match_commitment() {
        let mut rng = StdRng::seed_from_u64(0);
        let (commitment, shares) = generate_shares(&mut rng, 5, 2);
        assert_eq!(shares.len(), 5);
        assert_eq!(commitment.required(), 2);
        for (share, eval) in shares.iter().zip(evaluate_all(&commitment, 5)) {
            assert_eq!(share.index, eval.index);
            assert_eq!(share.public(), eval.value);
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let (a, _) = generate_shares(&mut StdRng::seed_from_u64(7), 4, 2);
        let (b, _) = generate_shares(&mut StdRng::seed_from_u64(7), 4, 2);
        assert_eq!(public(&a), public(&b));
    }

    #[test]
    #[should_panic]
    fn rejects_threshold_above_n() {
        generate_shares(&mut StdRng::seed_from_u64(0), 3, 4);
    }
}
