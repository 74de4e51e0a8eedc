//! Flip common coins among a simulated group of participants.
//!
//! Every honest participant runs a [commoncoin::Engine] over an in-memory network with configurable
//! latency, jitter, and drop rate. For each round, all honest participants request the round's coin
//! concurrently and the binary prints the coin they agree on (or panics if they disagree).
//!
//! # Byzantine Participants
//!
//! The last `--byzantine` participants never run an engine. Instead, for every round they broadcast
//! a share signed over the wrong round and a garbage message (and never reveal their real share).
//! Because honest participants only accept verified shares, at most `f` such participants cannot
//! prevent or bias any coin.
//!
//! # Usage
//!
//! _To run this example, you must first install [Rust](https://www.rust-lang.org/tools/install)._
//!
//! ```sh
//! cargo run --release --bin commoncoin-flip -- --n 7 --rounds 10 --byzantine 2 --latency 50 --jitter 20
//! ```
//!
//! ```txt
//! coin 0: 1
//! coin 1: 0
//! ...
//! ```
//!
//! To inspect the key set used for a given seed:
//!
//! ```sh
//! cargo run --release --bin dealer -- --seed 0 --n 7
//! ```
//!
//! With `--success-rate` below 1, shares may be lost (shares are never retransmitted), so some
//! rounds may not resolve within the timeout.

use bytes::Bytes;
use clap::{value_parser, Arg, ArgAction, Command};
use commoncoin::{scheme::context, wire, Bls, Config, Engine, Scheme};
use commoncoin_codec::Encode;
use commoncoin_cryptography::{bls12381::dealer::generate_shares, utils::max_faults};
use commoncoin_p2p::{
    simulated::{self, Link, Network},
    Receiver as _, Recipients, Sender as _,
};
use futures::future::join_all;
use prometheus_client::{encoding::text::encode, registry::Registry};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{info, warn, Level};

/// Unique namespace to avoid message replay attacks.
const NAMESPACE: &[u8] = b"_COMMONCOIN_FLIP";

const MAILBOX_SIZE: usize = 1024;
const MAX_MESSAGE_SIZE: usize = 1024;
const ROUND_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    // Parse arguments
    let matches = Command::new("commoncoin-flip")
        .about("flip common coins among a simulated group of participants")
        .arg(
            Arg::new("n")
                .long("n")
                .default_value("4")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("f")
                .long("f")
                .required(false)
                .value_parser(value_parser!(u32))
                .help("Faults tolerated (defaults to the maximum for n)"),
        )
        .arg(
            Arg::new("rounds")
                .long("rounds")
                .default_value("10")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .default_value("0")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("byzantine")
                .long("byzantine")
                .default_value("0")
                .value_parser(value_parser!(u32))
                .help("Number of participants that send invalid shares"),
        )
        .arg(
            Arg::new("latency")
                .long("latency")
                .default_value("10")
                .value_parser(value_parser!(f64))
                .help("Mean link latency in milliseconds"),
        )
        .arg(
            Arg::new("jitter")
                .long("jitter")
                .default_value("5")
                .value_parser(value_parser!(f64))
                .help("Standard deviation of link latency in milliseconds"),
        )
        .arg(
            Arg::new("success-rate")
                .long("success-rate")
                .default_value("1")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .value_parser(value_parser!(String)),
        )
        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue))
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .action(ArgAction::SetTrue)
                .help("Print metrics after the last round"),
        )
        .get_matches();

    // Create logger
    let level = matches
        .get_one::<String>("log-level")
        .expect("log level has a default");
    let level = Level::from_str(level).expect("Log level not well-formed");
    if matches.get_flag("json") {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    // Parse participants
    let n = *matches.get_one::<u32>("n").expect("n has a default");
    let f = matches
        .get_one::<u32>("f")
        .copied()
        .unwrap_or_else(|| max_faults(n));
    if f > max_faults(n) {
        panic!("{} participants tolerate at most {} faults", n, max_faults(n));
    }
    let byzantine = *matches
        .get_one::<u32>("byzantine")
        .expect("byzantine has a default");
    if byzantine > f {
        panic!("At most f={} participants may be byzantine", f);
    }
    let rounds = *matches.get_one::<u64>("rounds").expect("rounds has a default");
    let seed = *matches.get_one::<u64>("seed").expect("seed has a default");
    let link = Link {
        latency: *matches.get_one::<f64>("latency").expect("latency has a default"),
        jitter: *matches.get_one::<f64>("jitter").expect("jitter has a default"),
        success_rate: *matches
            .get_one::<f64>("success-rate")
            .expect("success rate has a default"),
    };
    info!(n, f, byzantine, rounds, seed, ?link, "loaded configuration");

    // Generate shares
    let mut rng = StdRng::seed_from_u64(seed);
    let (polynomial, shares) = generate_shares(&mut rng, n, f + 1);

    // Start network
    let registry = Arc::new(Mutex::new(Registry::default()));
    let mut network = Network::new(simulated::Config {
        max_size: MAX_MESSAGE_SIZE,
        seed,
        registry: registry.clone(),
    });

    // Start participants
    let mut mailboxes = Vec::new();
    let mut engines = Vec::new();
    for share in shares {
        let me = share.index;
        let scheme = Bls::new(n, polynomial.clone(), share).expect("Share not well-formed");
        let (sender, receiver) = network
            .register(me)
            .expect("Unable to register participant");
        if me >= n - byzantine {
            info!(me, "starting byzantine participant");
            tokio::spawn(corrupt(scheme, rounds, sender, receiver));
            continue;
        }
        let (engine, mailbox) = Engine::new(Config {
            scheme,
            namespace: NAMESPACE.to_vec(),
            me,
            participants: n,
            faults: f,
            mailbox_size: MAILBOX_SIZE,
            priority: false,
            registry: registry.clone(),
        })
        .expect("Configuration not well-formed");
        engines.push(engine.start(sender, receiver));
        mailboxes.push(mailbox);
    }
    network.link_all(link).expect("Link not well-formed");
    tokio::spawn(network.run());

    // Flip coins
    for round in 0..rounds {
        let requests = mailboxes.iter().cloned().map(|mut mailbox| async move {
            tokio::time::timeout(ROUND_TIMEOUT, mailbox.get_coin(round)).await
        });
        let mut coins = Vec::new();
        for (me, result) in join_all(requests).await.into_iter().enumerate() {
            match result {
                Ok(Ok(coin)) => coins.push(coin),
                Ok(Err(err)) => panic!("participant {} failed: {}", me, err),
                Err(_) => warn!(me, round, "coin unresolved"),
            }
        }
        if coins.windows(2).any(|w| w[0] != w[1]) {
            panic!("participants disagree on round {}: {:?}", round, coins);
        }
        match coins.first() {
            Some(coin) => println!("coin {}: {}", round, *coin as u8),
            None => println!("coin {}: unresolved", round),
        }
    }

    // Print metrics
    if matches.get_flag("metrics") {
        let mut buffer = String::new();
        encode(&mut buffer, &registry.lock().unwrap()).expect("Unable to encode metrics");
        println!("{}", buffer);
    }

    // Shutdown
    for engine in engines {
        engine.abort();
    }
}

/// Broadcasts a share signed over the wrong round and a garbage message for every round,
/// then drops everything it receives.
async fn corrupt(
    scheme: Bls,
    rounds: u64,
    mut sender: simulated::Sender,
    mut receiver: simulated::Receiver,
) {
    let me = scheme.index();
    for round in 0..rounds {
        let digest = scheme.hash_message(&context(NAMESPACE, round + 1));
        let forged = wire::Message::new(round, scheme.sign(&digest))
            .encode()
            .freeze();
        let garbage = Bytes::from(format!("heads {}", round));
        for message in [forged, garbage] {
            if let Err(err) = sender.send(Recipients::All, message, false).await {
                warn!(me, round, ?err, "failed to send");
                return;
            }
        }
    }
    while receiver.recv().await.is_ok() {}
}
