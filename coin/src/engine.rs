use crate::{
    bit,
    ingress::{Mailbox, Message},
    ledger::{Ledger, Outcome},
    metrics::{Metrics, Status},
    slot::Slot,
    wire, Config, Error, Scheme,
};
use bytes::Bytes;
use commoncoin_codec::{DecodeExt, Encode};
use commoncoin_p2p::{Receiver, Recipients, Sender};
use futures::{channel::mpsc, StreamExt};
use prometheus_client::registry::Registry;
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Collects signature shares for every round and resolves each round's coin once
/// `f+1` valid shares are held.
pub struct Engine<S: Scheme> {
    scheme: S,
    me: u32,
    threshold: u32,
    priority: bool,

    mailbox: mpsc::Receiver<Message>,

    ledger: Ledger<S>,
    slots: BTreeMap<u64, Slot>,
    shared: BTreeSet<u64>,

    metrics: Metrics,
}

impl<S: Scheme> Engine<S> {
    /// Creates a new engine and the [Mailbox] used to request coins from it.
    pub fn new(cfg: Config<S>) -> Result<(Self, Mailbox), Error> {
        cfg.assert()?;

        let metrics = {
            let mut registry = cfg.registry.lock().unwrap();
            let registry: &mut Registry = registry
                .sub_registry_with_prefix("coin")
                .sub_registry_with_label(("participant".into(), cfg.me.to_string().into()));
            Metrics::init(registry)
        };
        let (sender, mailbox) = mpsc::channel(cfg.mailbox_size);
        Ok((
            Self {
                threshold: cfg.scheme.threshold(),
                ledger: Ledger::new(cfg.scheme.clone(), cfg.namespace),
                scheme: cfg.scheme,
                me: cfg.me,
                priority: cfg.priority,
                mailbox,
                slots: BTreeMap::new(),
                shared: BTreeSet::new(),
                metrics,
            },
            Mailbox::new(sender),
        ))
    }

    /// Starts the engine on the current tokio runtime.
    ///
    /// The task exits with `Ok(())` when `receiver` closes and with
    /// [Error::CommonCoinFailure] if a combined signature fails verification.
    /// Outstanding requests return [Error::Shutdown] once it exits (or is aborted).
    ///
    /// Shares are broadcast from the dispatch loop, so `sender` must hand messages off without
    /// waiting on delivery or applying backpressure. No inbound share is processed while a
    /// send is pending.
    pub fn start(
        self,
        sender: impl Sender,
        receiver: impl Receiver,
    ) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.run(sender, receiver))
    }

    async fn run(
        mut self,
        mut sender: impl Sender,
        mut receiver: impl Receiver,
    ) -> Result<(), Error> {
        let mut requests = true;
        loop {
            tokio::select! {
                message = self.mailbox.next(), if requests => {
                    let Some(message) = message else {
                        debug!(me = self.me, "mailbox closed");
                        requests = false;
                        continue;
                    };
                    match message {
                        Message::Coin { round, response } => {
                            self.request(round, response, &mut sender).await?;
                        }
                    }
                },
                message = receiver.recv() => {
                    let (peer, message) = match message {
                        Ok(message) => message,
                        Err(err) => {
                            debug!(me = self.me, ?err, "receiver closed");
                            return Ok(());
                        }
                    };
                    self.handle(peer, message)?;
                },
            }
        }
    }

    async fn request(
        &mut self,
        round: u64,
        response: futures::channel::oneshot::Sender<bool>,
        sender: &mut impl Sender,
    ) -> Result<(), Error> {
        self.slots.entry(round).or_default().subscribe(response);
        if !self.shared.insert(round) {
            return Ok(());
        }

        // Record our own share through the same path as everyone else's
        let digest = self.ledger.digest(round);
        let partial = self.scheme.sign(&digest);
        let message = wire::Message::new(round, partial.clone()).encode().freeze();
        self.record(round, self.me, partial)?;

        // Share with everyone else
        self.metrics.broadcasts.inc();
        if let Err(err) = sender.send(Recipients::All, message, self.priority).await {
            warn!(me = self.me, round, ?err, "failed to broadcast share");
        }
        Ok(())
    }

    fn handle(&mut self, peer: u32, message: Bytes) -> Result<(), Error> {
        let message = match wire::Message::<S::Partial>::decode(message) {
            Ok(message) => message,
            Err(err) => {
                warn!(me = self.me, sender = peer, ?err, "malformed share");
                self.metrics.share(Status::Malformed);
                return Ok(());
            }
        };
        self.record(message.round, peer, message.share)
    }

    fn record(&mut self, round: u64, signer: u32, partial: S::Partial) -> Result<(), Error> {
        let outcome = self.ledger.accept(round, signer, partial);
        self.metrics.rounds.set(self.ledger.rounds() as i64);
        match outcome {
            Outcome::Accepted(count) => {
                self.metrics.share(Status::Accepted);
                debug!(me = self.me, sender = signer, round, count, "accepted share");
                if count == self.threshold as usize {
                    self.resolve(round)?;
                }
            }
            Outcome::Duplicate => {
                self.metrics.share(Status::Duplicate);
                debug!(me = self.me, sender = signer, round, "redundant share");
            }
            Outcome::Invalid => {
                self.metrics.share(Status::Invalid);
                debug!(me = self.me, sender = signer, round, "invalid share");
            }
            Outcome::UnknownSigner => {
                self.metrics.share(Status::Unknown);
                debug!(me = self.me, sender = signer, round, "unknown signer");
            }
        }
        Ok(())
    }

    fn resolve(&mut self, round: u64) -> Result<(), Error> {
        let slot = self.slots.entry(round).or_default();
        if slot.value().is_some() {
            return Ok(());
        }

        // Combine the first `k` shares and check the result
        let digest = self.ledger.digest(round);
        let selected = self.ledger.select(round, self.threshold as usize);
        let signature = match self.scheme.combine(selected) {
            Ok(signature) => signature,
            Err(err) => {
                error!(me = self.me, round, ?err, "failed to combine shares");
                return Err(Error::CommonCoinFailure { round });
            }
        };
        if let Err(err) = self.scheme.verify_signature(&digest, &signature) {
            error!(me = self.me, round, ?err, "combined signature is invalid");
            return Err(Error::CommonCoinFailure { round });
        }

        // Publish
        let coin = bit::derive(&signature);
        self.slots.entry(round).or_default().resolve(coin);
        self.metrics.coins.inc();
        info!(me = self.me, round, coin, "resolved coin");
        Ok(())
    }
}
