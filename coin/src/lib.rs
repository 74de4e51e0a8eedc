//! Agree on unpredictable shared random bits with threshold signatures.
//!
//! A common coin gives every participant of an asynchronous Byzantine agreement protocol
//! the same random bit for each round, even when up to `f` of `n` participants are faulty
//! and messages are delayed or reordered. No participant can learn (or bias) a round's bit
//! before `f+1` participants have revealed their share for it.
//!
//! # Architecture
//!
//! The core of the crate is the [Engine]. It owns all protocol state and runs as a single task:
//! - Requests for a round's coin arrive through a [Mailbox]. The first request for a round signs
//!   the round's context with the local key share, records the share locally, and broadcasts it.
//! - Shares from other participants arrive through a [commoncoin_p2p::Receiver], are verified,
//!   and are recorded in a per-round [ledger::Ledger]. Duplicate, invalid, and malformed shares
//!   are logged and dropped.
//! - When a round holds exactly `f+1` verified shares, the first `f+1` (in the order they were
//!   recorded) are combined into a threshold signature. The coin is the parity of the first
//!   byte of the SHA-256 digest of that signature ([bit::derive]).
//!
//! Rounds are independent: any number may be in flight and they may resolve in any order.
//! Because any `f+1` valid shares recover the same signature, every participant that resolves
//! a round obtains the same coin.
//!
//! # Failures
//!
//! Faulty input from other participants never stops the [Engine]. A combined signature that
//! fails verification, on the other hand, can only result from a broken [Scheme] and stops the
//! engine with [Error::CommonCoinFailure]. Once the engine stops (for any reason), outstanding
//! and future requests return [Error::Shutdown].
//!
//! # Example
//!
//! ```rust
//! use commoncoin::{mocks, Config, Engine, Scheme};
//! use commoncoin_p2p::simulated::{self, Link, Network};
//! use prometheus_client::registry::Registry;
//! use std::sync::{Arc, Mutex};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (n, f) = (4, 1);
//! let registry = Arc::new(Mutex::new(Registry::default()));
//! let mut network = Network::new(simulated::Config {
//!     max_size: 1024,
//!     seed: 0,
//!     registry: registry.clone(),
//! });
//!
//! // Start an engine for each participant
//! let mut mailboxes = Vec::new();
//! for scheme in mocks::fixture(0, n, f) {
//!     let me = scheme.index();
//!     let (sender, receiver) = network.register(me).unwrap();
//!     let (engine, mailbox) = Engine::new(Config {
//!         scheme,
//!         namespace: b"example".to_vec(),
//!         me,
//!         participants: n,
//!         faults: f,
//!         mailbox_size: 16,
//!         priority: false,
//!         registry: registry.clone(),
//!     })
//!     .unwrap();
//!     engine.start(sender, receiver);
//!     mailboxes.push(mailbox);
//! }
//! network
//!     .link_all(Link { latency: 10.0, jitter: 2.0, success_rate: 1.0 })
//!     .unwrap();
//! tokio::spawn(network.run());
//!
//! // Everyone flips the same coin
//! let mut coins = Vec::new();
//! for mailbox in &mut mailboxes {
//!     coins.push(mailbox.get_coin(0));
//! }
//! let coins = futures::future::join_all(coins).await;
//! assert!(coins.windows(2).all(|w| w[0].as_ref().unwrap() == w[1].as_ref().unwrap()));
//! # }
//! ```

pub mod bit;
mod config;
pub use config::Config;
mod engine;
pub use engine::Engine;
mod ingress;
pub use ingress::Mailbox;
pub mod ledger;
mod metrics;
pub mod mocks;
pub mod scheme;
pub use scheme::{Bls, Scheme};
mod slot;
pub mod wire;

use thiserror::Error;

/// Errors that can occur when running the common coin.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("combined signature for round {round} failed verification")]
    CommonCoinFailure { round: u64 },
    #[error("engine shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{fixture, share, Broken},
        scheme::context,
    };
    use bytes::Bytes;
    use commoncoin_codec::{DecodeExt, Encode};
    use commoncoin_cryptography::bls12381::primitives::group;
    use commoncoin_p2p::{
        simulated::{self, Link, Network},
        Recipients,
    };
    use futures::{future::join_all, StreamExt};
    use prometheus_client::{encoding::text::encode, registry::Registry};
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };
    use test_case::test_case;
    use tokio::{task::JoinHandle, time::timeout};

    const NAMESPACE: &[u8] = b"common_coin_test";
    const PENDING: Duration = Duration::from_millis(200);

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn config<S: Scheme>(scheme: S, n: u32, f: u32) -> Config<S> {
        Config {
            me: scheme.index(),
            scheme,
            namespace: NAMESPACE.to_vec(),
            participants: n,
            faults: f,
            mailbox_size: 16,
            priority: false,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    fn start<S: Scheme>(
        scheme: S,
        n: u32,
        f: u32,
    ) -> (JoinHandle<Result<(), Error>>, Mailbox, mocks::Transport) {
        let registry = Arc::new(Mutex::new(Registry::default()));
        start_registered(scheme, n, f, registry)
    }

    fn start_registered<S: Scheme>(
        scheme: S,
        n: u32,
        f: u32,
        registry: Arc<Mutex<Registry>>,
    ) -> (JoinHandle<Result<(), Error>>, Mailbox, mocks::Transport) {
        init_logging();
        let (engine, mailbox) = Engine::new(Config {
            registry,
            ..config(scheme, n, f)
        })
        .unwrap();
        let (sender, receiver, transport) = mocks::transport();
        (engine.start(sender, receiver), mailbox, transport)
    }

    /// Returns the value of the `name` sample whose labels include `label` (0 if absent).
    fn sample(registry: &Mutex<Registry>, name: &str, label: &str) -> u64 {
        let mut buffer = String::new();
        encode(&mut buffer, &registry.lock().unwrap()).unwrap();
        let prefix = format!("{}{{", name);
        buffer
            .lines()
            .find(|line| line.starts_with(&prefix) && line.contains(label))
            .and_then(|line| line.rsplit(' ').next())
            .map(|value| value.parse().unwrap())
            .unwrap_or(0)
    }

    /// Waits until the `name` sample reaches `value`.
    async fn settle(registry: &Mutex<Registry>, name: &str, label: &str, value: u64) {
        let wait = async {
            while sample(registry, name, label) != value {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        timeout(PENDING, wait)
            .await
            .unwrap_or_else(|_| panic!("{} {} never reached {}", name, label, value));
    }

    fn request(mailbox: &Mailbox, round: u64) -> JoinHandle<Result<bool, Error>> {
        let mut mailbox = mailbox.clone();
        tokio::spawn(async move { mailbox.get_coin(round).await })
    }

    /// Computes the coin for `round` directly from the shares of `signers`.
    fn expected(schemes: &[Bls], round: u64, signers: &[u32]) -> bool {
        let digest = schemes[0].hash_message(&context(NAMESPACE, round));
        let partials = signers
            .iter()
            .map(|i| (*i, schemes[*i as usize].sign(&digest)))
            .collect::<Vec<_>>();
        let signature = schemes[0]
            .combine(partials.iter().map(|(i, p)| (*i, p)))
            .unwrap();
        bit::derive(&signature)
    }

    #[tokio::test]
    async fn test_agreement() {
        let schemes = fixture(0, 4, 1);
        let mut coins = Vec::new();
        for me in [0, 1] {
            let (_handle, mut mailbox, transport) = start(schemes[me].clone(), 4, 1);
            transport.deliver(2, share(&schemes[2], NAMESPACE, 0));
            transport.deliver(3, share(&schemes[3], NAMESPACE, 0));
            coins.push(mailbox.get_coin(0).await.unwrap());
        }
        assert_eq!(coins[0], coins[1]);
        assert_eq!(coins[0], expected(&schemes, 0, &[2, 3]));
    }

    #[tokio::test]
    async fn test_threshold_necessity() {
        let schemes = fixture(1, 4, 1);
        let (_handle, mailbox, mut transport) = start(schemes[0].clone(), 4, 1);
        let mut pending = request(&mailbox, 0);

        // Our own share is broadcast to everyone else
        let (recipients, message) = transport.sent.next().await.unwrap();
        assert_eq!(recipients, Recipients::All);
        let message = wire::Message::<group::Signature>::decode(message).unwrap();
        assert_eq!(message.round, 0);
        let digest = schemes[0].hash_message(&context(NAMESPACE, 0));
        schemes[1].verify_share(0, &digest, &message.share).unwrap();

        // With only `f` shares the coin is not available
        assert!(timeout(PENDING, &mut pending).await.is_err());

        // The `f+1`th share resolves it
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));
        let coin = pending.await.unwrap().unwrap();
        assert_eq!(coin, expected(&schemes, 0, &[0, 1]));
    }

    #[tokio::test]
    async fn test_duplicate_immunity() {
        let schemes = fixture(2, 7, 2);
        let (_handle, mailbox, transport) = start(schemes[0].clone(), 7, 2);
        let mut pending = request(&mailbox, 0);

        // Our share plus the same share from participant 1 (twice) is not enough
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));
        assert!(timeout(PENDING, &mut pending).await.is_err());

        // A share from a third participant is
        transport.deliver(2, share(&schemes[2], NAMESPACE, 0));
        let coin = pending.await.unwrap().unwrap();
        assert_eq!(coin, expected(&schemes, 0, &[0, 1, 2]));
    }

    #[tokio::test]
    async fn test_byzantine_tolerance() {
        let schemes = fixture(3, 4, 1);
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (handle, mailbox, transport) =
            start_registered(schemes[0].clone(), 4, 1, registry.clone());
        let mut pending = request(&mailbox, 0);

        // Participant 1 replays participant 2's share
        transport.deliver(1, share(&schemes[2], NAMESPACE, 0));

        // Participant 1 sends its share for another round, labeled as round 0
        let digest = schemes[1].hash_message(&context(NAMESPACE, 1));
        let forged = wire::Message::new(0, schemes[1].sign(&digest));
        transport.deliver(1, forged.encode().freeze());

        // Participant 1 sends a share from another session
        transport.deliver(1, share(&schemes[1], b"other", 0));

        // Garbage and out-of-range senders
        transport.deliver(1, Bytes::from_static(b"garbage"));
        transport.deliver(1, Bytes::new());
        transport.deliver(9, share(&schemes[1], NAMESPACE, 0));
        assert!(timeout(PENDING, &mut pending).await.is_err());
        assert!(!handle.is_finished());

        // The genuine share from participant 1 still counts
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));
        let coin = pending.await.unwrap().unwrap();
        assert_eq!(coin, expected(&schemes, 0, &[0, 1]));

        // Every rejected share is counted by reason
        let shares = "coin_shares_total";
        assert_eq!(sample(&registry, shares, "status=\"Accepted\""), 2);
        assert_eq!(sample(&registry, shares, "status=\"Invalid\""), 3);
        assert_eq!(sample(&registry, shares, "status=\"Malformed\""), 2);
        assert_eq!(sample(&registry, shares, "status=\"Unknown\""), 1);
        assert_eq!(sample(&registry, shares, "status=\"Duplicate\""), 0);
        assert_eq!(sample(&registry, "coin_coins_total", "participant=\"0\""), 1);
        assert_eq!(sample(&registry, "coin_broadcasts_total", "participant=\"0\""), 1);
        assert_eq!(sample(&registry, "coin_rounds", "participant=\"0\""), 1);
    }

    #[tokio::test]
    async fn test_idempotence() {
        let schemes = fixture(4, 4, 1);
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (_handle, mut mailbox, mut transport) =
            start_registered(schemes[0].clone(), 4, 1, registry.clone());
        let pending = request(&mailbox, 0);
        transport.deliver(3, share(&schemes[3], NAMESPACE, 0));
        let coin = pending.await.unwrap().unwrap();

        // Exactly one broadcast
        transport.sent.next().await.unwrap();

        // Repeated requests (and stragglers) change nothing
        for _ in 0..3 {
            assert_eq!(mailbox.get_coin(0).await.unwrap(), coin);
        }
        transport.deliver(2, share(&schemes[2], NAMESPACE, 0));
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));
        assert_eq!(mailbox.get_coin(0).await.unwrap(), coin);
        assert!(transport.sent.try_next().is_err());

        // Stragglers are still recorded, but never combined again
        settle(&registry, "coin_shares_total", "status=\"Accepted\"", 4).await;
        assert_eq!(mailbox.get_coin(0).await.unwrap(), coin);
        assert_eq!(sample(&registry, "coin_coins_total", "participant=\"0\""), 1);
        assert_eq!(sample(&registry, "coin_broadcasts_total", "participant=\"0\""), 1);
    }

    #[tokio::test]
    async fn test_concurrent_waiters() {
        let schemes = fixture(5, 4, 1);
        let (_handle, mailbox, transport) = start(schemes[0].clone(), 4, 1);
        let waiters = (0..5).map(|_| request(&mailbox, 3)).collect::<Vec<_>>();
        transport.deliver(2, share(&schemes[2], NAMESPACE, 3));
        let coins = join_all(waiters).await;
        let expected = expected(&schemes, 3, &[0, 2]);
        for coin in coins {
            assert_eq!(coin.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_round_independence() {
        let schemes = fixture(6, 4, 1);
        let (_handle, mailbox, transport) = start(schemes[0].clone(), 4, 1);
        let mut zero = request(&mailbox, 0);
        let five = request(&mailbox, 5);

        // Round 5 resolves first
        transport.deliver(1, share(&schemes[1], NAMESPACE, 5));
        assert_eq!(five.await.unwrap().unwrap(), expected(&schemes, 5, &[0, 1]));
        assert!(timeout(PENDING, &mut zero).await.is_err());

        // Round 0 resolves on its own
        transport.deliver(2, share(&schemes[2], NAMESPACE, 0));
        assert_eq!(zero.await.unwrap().unwrap(), expected(&schemes, 0, &[0, 2]));
    }

    #[tokio::test]
    async fn test_shares_before_request() {
        let schemes = fixture(7, 4, 1);
        let (_handle, mut mailbox, transport) = start(schemes[0].clone(), 4, 1);

        // Enough shares arrive before we ask
        transport.deliver(1, share(&schemes[1], NAMESPACE, 2));
        transport.deliver(3, share(&schemes[3], NAMESPACE, 2));
        assert_eq!(
            mailbox.get_coin(2).await.unwrap(),
            expected(&schemes, 2, &[1, 3])
        );
    }

    #[tokio::test]
    async fn test_subset_independence() {
        let schemes = fixture(8, 7, 2);

        // Participant 0 combines {0, 1, 2}, participant 6 combines {6, 5, 4}
        let (_a, mut first, first_transport) = start(schemes[0].clone(), 7, 2);
        let (_b, mut second, second_transport) = start(schemes[6].clone(), 7, 2);
        for signer in [1, 2] {
            first_transport.deliver(signer, share(&schemes[signer as usize], NAMESPACE, 0));
        }
        for signer in [5, 4] {
            second_transport.deliver(signer, share(&schemes[signer as usize], NAMESPACE, 0));
        }
        let first = first.get_coin(0).await.unwrap();
        let second = second.get_coin(0).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_combine_failure_is_fatal() {
        let schemes = fixture(9, 4, 1);
        let (handle, mut mailbox, transport) = start(Broken(schemes[0].clone()), 4, 1);
        let pending = request(&mailbox, 0);
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));

        assert!(matches!(
            handle.await.unwrap(),
            Err(Error::CommonCoinFailure { round: 0 })
        ));
        assert!(matches!(pending.await.unwrap(), Err(Error::Shutdown)));
        assert!(matches!(mailbox.get_coin(1).await, Err(Error::Shutdown)));
        drop(transport);
    }

    #[tokio::test]
    async fn test_receiver_closed() {
        let schemes = fixture(10, 4, 1);
        let (handle, mailbox, mut transport) = start(schemes[0].clone(), 4, 1);
        let pending = request(&mailbox, 0);

        // Wait for the request to be processed
        transport.sent.next().await.unwrap();
        drop(transport);

        assert!(handle.await.unwrap().is_ok());
        assert!(matches!(pending.await.unwrap(), Err(Error::Shutdown)));
    }

    #[tokio::test]
    async fn test_abort() {
        let schemes = fixture(11, 4, 1);
        let (handle, mailbox, mut transport) = start(schemes[0].clone(), 4, 1);
        let pending = request(&mailbox, 0);
        transport.sent.next().await.unwrap();

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(matches!(pending.await.unwrap(), Err(Error::Shutdown)));
    }

    #[tokio::test]
    async fn test_runs_without_mailboxes() {
        let schemes = fixture(12, 4, 1);
        let (handle, mailbox, transport) = start(schemes[0].clone(), 4, 1);
        drop(mailbox);

        // Shares are still consumed
        transport.deliver(1, share(&schemes[1], NAMESPACE, 0));
        transport.deliver(2, share(&schemes[2], NAMESPACE, 0));
        tokio::time::sleep(PENDING).await;
        assert!(!handle.is_finished());

        drop(transport);
        assert!(handle.await.unwrap().is_ok());
    }

    #[test_case(|c| c.faults = 2; "threshold mismatch")]
    #[test_case(|c| c.faults = u32::MAX; "faults at limit")]
    #[test_case(|c| c.participants = 5; "shareholder mismatch")]
    #[test_case(|c| c.me = 4; "index out of range")]
    #[test_case(|c| c.me = 1; "index mismatch")]
    #[test_case(|c| c.mailbox_size = 0; "empty mailbox")]
    fn test_invalid_config(modify: fn(&mut Config<Bls>)) {
        let schemes = fixture(13, 4, 1);
        let mut cfg = config(schemes[0].clone(), 4, 1);
        assert!(Engine::new(config(schemes[0].clone(), 4, 1)).is_ok());
        modify(&mut cfg);
        assert!(matches!(Engine::new(cfg), Err(Error::InvalidConfig(_))));
    }

    async fn simulate(n: u32, f: u32, crashed: u32, rounds: u64, success_rate: f64) {
        init_logging();
        let schemes = fixture(n as u64 + crashed as u64, n, f);
        let registry = Arc::new(Mutex::new(Registry::default()));
        let mut network = Network::new(simulated::Config {
            max_size: 1024,
            seed: 42,
            registry: registry.clone(),
        });

        // Start engines (the last `crashed` participants never run)
        let mut mailboxes = Vec::new();
        let mut handles = Vec::new();
        for scheme in schemes {
            let me = scheme.index();
            let (sender, receiver) = network.register(me).unwrap();
            if me >= n - crashed {
                continue;
            }
            let (engine, mailbox) = Engine::new(Config {
                registry: registry.clone(),
                ..config(scheme, n, f)
            })
            .unwrap();
            handles.push(engine.start(sender, receiver));
            mailboxes.push(mailbox);
        }
        network
            .link_all(Link {
                latency: 10.0,
                jitter: 5.0,
                success_rate,
            })
            .unwrap();
        tokio::spawn(network.run());

        // Request rounds in reverse order on every participant
        for round in (0..rounds).rev() {
            let coins = join_all(mailboxes.iter().map(|mailbox| request(mailbox, round))).await;
            let coins = coins
                .into_iter()
                .map(|coin| coin.unwrap().unwrap())
                .collect::<Vec<_>>();
            assert!(coins.windows(2).all(|w| w[0] == w[1]), "round {round}: {coins:?}");
        }
        for handle in handles {
            assert!(!handle.is_finished());
        }
    }

    #[test_case(4, 1, 0; "n=4 f=1")]
    #[test_case(4, 1, 1; "n=4 f=1 one crashed")]
    #[test_case(7, 2, 2; "n=7 f=2 two crashed")]
    #[tokio::test]
    async fn test_simulated_network(n: u32, f: u32, crashed: u32) {
        simulate(n, f, crashed, 5, 1.0).await;
    }
}
