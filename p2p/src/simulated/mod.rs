//! Send messages between participants with configurable performance (drops, latency, jitter).
//!
//! # Example
//!
//! ```rust
//! use commoncoin_p2p::{simulated::{Config, Link, Network}, Receiver, Recipients, Sender};
//! use bytes::Bytes;
//! use prometheus_client::registry::Registry;
//! use std::sync::{Arc, Mutex};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut network = Network::new(Config {
//!     max_size: 1024,
//!     seed: 0,
//!     registry: Arc::new(Mutex::new(Registry::default())),
//! });
//! let (mut sender, _) = network.register(0).unwrap();
//! let (_, mut receiver) = network.register(1).unwrap();
//! network.link(0, 1, Link { latency: 10.0, jitter: 1.0, success_rate: 1.0 }).unwrap();
//! tokio::spawn(network.run());
//!
//! let sent = sender.send(Recipients::All, Bytes::from_static(b"hello"), false).await.unwrap();
//! assert_eq!(sent, vec![1]);
//! let (origin, message) = receiver.recv().await.unwrap();
//! assert_eq!(origin, 0);
//! assert_eq!(message, Bytes::from_static(b"hello"));
//! # }
//! ```

mod metrics;
mod network;

pub use network::{Config, Link, Network, Receiver, Sender};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("message too large: {0}")]
    MessageTooLarge(usize),
    #[error("network closed")]
    NetworkClosed,
    #[error("not valid to link self")]
    LinkingSelf,
    #[error("invalid success rate (must be in [0, 1]): {0}")]
    InvalidSuccessRate(f64),
    #[error("invalid latency (must be non-negative): {0}")]
    InvalidLatency(f64),
    #[error("invalid jitter (must be non-negative and finite): {0}")]
    InvalidJitter(f64),
    #[error("unknown participant: {0}")]
    UnknownParticipant(u32),
    #[error("participant already registered: {0}")]
    AlreadyRegistered(u32),
}
