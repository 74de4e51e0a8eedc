use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

/// Outcome of processing an inbound share.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Status {
    Accepted,
    Duplicate,
    Invalid,
    Unknown,
    Malformed,
}

/// Share labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Share {
    pub status: Status,
}

impl Share {
    pub const fn new(status: Status) -> Self {
        Self { status }
    }
}

/// Metrics for the [crate::Engine].
#[derive(Default)]
pub struct Metrics {
    /// Number of shares processed by status
    pub shares: Family<Share, Counter>,
    /// Number of coins resolved
    pub coins: Counter,
    /// Number of rounds tracked
    pub rounds: Gauge,
    /// Number of local shares broadcast
    pub broadcasts: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "shares",
            "Number of shares processed by status",
            metrics.shares.clone(),
        );
        registry.register("coins", "Number of coins resolved", metrics.coins.clone());
        registry.register("rounds", "Number of rounds tracked", metrics.rounds.clone());
        registry.register(
            "broadcasts",
            "Number of local shares broadcast",
            metrics.broadcasts.clone(),
        );
        metrics
    }

    /// Records the processing of a share.
    pub fn share(&self, status: Status) {
        self.shares.get_or_create(&Share::new(status)).inc();
    }
}
