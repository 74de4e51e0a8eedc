//! Implementation of a `simulated` network.

use super::{metrics, Error};
use crate::{Message, Recipients};
use bytes::Bytes;
use futures::{
    channel::{mpsc, oneshot},
    StreamExt,
};
use prometheus_client::{
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::debug;

type Task = (u32, Recipients, Bytes, oneshot::Sender<Vec<u32>>);

/// Describes a connection between two participants.
///
/// Links are unidirectional (and must be set up in both directions
/// for a bidirectional connection).
#[derive(Clone, Debug)]
pub struct Link {
    /// Mean latency for the delivery of a message in milliseconds.
    pub latency: f64,

    /// Standard deviation of the latency for the delivery of a message in milliseconds.
    pub jitter: f64,

    /// Probability of a message being delivered successfully (in range [0,1]).
    pub success_rate: f64,
}

struct Route {
    delay: Normal<f64>,
    success_rate: f64,
}

/// Configuration for a `simulated` network.
pub struct Config {
    /// Maximum size of a message that can be sent.
    pub max_size: usize,

    /// Seed for link decisions (delay and drops).
    pub seed: u64,

    /// Registry for network metrics.
    pub registry: Arc<Mutex<Registry>>,
}

/// Implementation of a `simulated` network.
pub struct Network {
    max_size: usize,
    rng: StdRng,

    sender: mpsc::UnboundedSender<Task>,
    receiver: mpsc::UnboundedReceiver<Task>,
    links: HashMap<u32, HashMap<u32, Route>>,
    agents: BTreeMap<u32, mpsc::UnboundedSender<Message>>,

    received_messages: Family<metrics::Message, Counter>,
    sent_messages: Family<metrics::Message, Counter>,
}

impl Network {
    /// Create a new simulated network.
    pub fn new(cfg: Config) -> Self {
        let (sender, receiver) = mpsc::unbounded();
        let sent_messages = Family::<metrics::Message, Counter>::default();
        let received_messages = Family::<metrics::Message, Counter>::default();
        {
            let mut registry = cfg.registry.lock().unwrap();
            registry.register("messages_sent", "messages sent", sent_messages.clone());
            registry.register(
                "messages_received",
                "messages received",
                received_messages.clone(),
            );
        }

        Self {
            max_size: cfg.max_size,
            rng: StdRng::seed_from_u64(cfg.seed),
            sender,
            receiver,
            links: HashMap::new(),
            agents: BTreeMap::new(),
            received_messages,
            sent_messages,
        }
    }

    /// Register a new participant with the network.
    ///
    /// By default, the participant will not be linked to any other participants.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&mut self, participant: u32) -> Result<(Sender, Receiver), Error> {
        if self.agents.contains_key(&participant) {
            return Err(Error::AlreadyRegistered(participant));
        }
        let (sender, receiver) = mpsc::unbounded();
        self.agents.insert(participant, sender);
        Ok((
            Sender::new(participant, self.max_size, self.sender.clone()),
            Receiver { receiver },
        ))
    }

    /// Create a unidirectional link between two participants.
    ///
    /// Link can be called multiple times for the same sender/receiver. The latest
    /// setting will be used.
    pub fn link(&mut self, sender: u32, receiver: u32, config: Link) -> Result<(), Error> {
        if sender == receiver {
            return Err(Error::LinkingSelf);
        }
        for participant in [sender, receiver] {
            if !self.agents.contains_key(&participant) {
                return Err(Error::UnknownParticipant(participant));
            }
        }
        if !(0.0..=1.0).contains(&config.success_rate) {
            return Err(Error::InvalidSuccessRate(config.success_rate));
        }
        if config.latency < 0.0 {
            return Err(Error::InvalidLatency(config.latency));
        }
        let delay = Normal::new(config.latency, config.jitter)
            .map_err(|_| Error::InvalidJitter(config.jitter))?;
        self.links.entry(sender).or_default().insert(
            receiver,
            Route {
                delay,
                success_rate: config.success_rate,
            },
        );
        Ok(())
    }

    /// Link every pair of registered participants (in both directions).
    pub fn link_all(&mut self, config: Link) -> Result<(), Error> {
        let participants = self.agents.keys().copied().collect::<Vec<_>>();
        for sender in &participants {
            for receiver in &participants {
                if sender == receiver {
                    continue;
                }
                self.link(*sender, *receiver, config.clone())?;
            }
        }
        Ok(())
    }

    /// Run the simulated network.
    ///
    /// Returns once every [Sender] has been dropped. Dropping the network closes
    /// all [Receiver]s once in-flight messages are delivered.
    pub async fn run(mut self) {
        // Only registered senders keep the network alive
        let (closed, _) = mpsc::unbounded();
        self.sender = closed;

        while let Some((origin, recipients, message, reply)) = self.receiver.next().await {
            // Collect recipients
            let recipients = match recipients {
                Recipients::All => self.agents.keys().copied().collect(),
                Recipients::Some(participants) => participants,
                Recipients::One(participant) => vec![participant],
            };

            // Send to all recipients
            let mut sent = Vec::new();
            for recipient in recipients {
                // Skip self
                if recipient == origin {
                    debug!(origin, recipient, reason = "self", "dropping message");
                    continue;
                }

                // Determine if recipient exists
                let Some(agent) = self.agents.get(&recipient) else {
                    debug!(origin, recipient, reason = "no agent", "dropping message");
                    continue;
                };

                // Determine if there is a link between the sender and recipient
                let Some(route) = self
                    .links
                    .get(&origin)
                    .and_then(|links| links.get(&recipient))
                else {
                    debug!(origin, recipient, reason = "no link", "dropping message");
                    continue;
                };

                // Record sent message as soon as we determine there is a link with recipient (approximates
                // having an open connection)
                self.sent_messages
                    .get_or_create(&metrics::Message::new(origin, recipient))
                    .inc();

                // Apply link settings
                let should_deliver = self.rng.gen_bool(route.success_rate);
                let delay = route.delay.sample(&mut self.rng);
                debug!(origin, recipient, ?delay, "sending message");

                // Deliver after the delay (messages on the same link may be reordered)
                let agent = agent.clone();
                let message = message.clone();
                let received_messages = self.received_messages.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
                    if !should_deliver {
                        debug!(
                            origin,
                            recipient,
                            reason = "random link failure",
                            "dropping message"
                        );
                        return;
                    }
                    if agent.unbounded_send((origin, message)).is_err() {
                        debug!(
                            origin,
                            recipient,
                            reason = "receiver closed",
                            "dropping message"
                        );
                        return;
                    }

                    // Only record received messages that were successfully sent
                    received_messages
                        .get_or_create(&metrics::Message::new(origin, recipient))
                        .inc();
                });
                sent.push(recipient);
            }

            // Notify sender of handed off messages
            let _ = reply.send(sent);
        }
    }
}

/// Implementation of a [crate::Sender] for the simulated network.
#[derive(Clone, Debug)]
pub struct Sender {
    me: u32,
    max_size: usize,

    high: mpsc::UnboundedSender<Task>,
    low: mpsc::UnboundedSender<Task>,
}

impl Sender {
    fn new(me: u32, max_size: usize, network: mpsc::UnboundedSender<Task>) -> Self {
        // Forward tasks to the network, preferring high priority ones
        let (high, mut high_receiver) = mpsc::unbounded();
        let (low, mut low_receiver) = mpsc::unbounded();
        tokio::spawn(async move {
            loop {
                let task = tokio::select! {
                    biased;
                    task = high_receiver.next() => task,
                    task = low_receiver.next() => task,
                };
                let Some(task) = task else {
                    break;
                };
                if network.unbounded_send(task).is_err() {
                    break;
                }
            }
        });

        Self {
            me,
            max_size,
            high,
            low,
        }
    }
}

impl crate::Sender for Sender {
    type Error = Error;

    async fn send(
        &mut self,
        recipients: Recipients,
        message: Bytes,
        priority: bool,
    ) -> Result<Vec<u32>, Error> {
        // Check message size
        if message.len() > self.max_size {
            return Err(Error::MessageTooLarge(message.len()));
        }

        // Send message
        let (sender, receiver) = oneshot::channel();
        let channel = if priority { &self.high } else { &self.low };
        channel
            .unbounded_send((self.me, recipients, message, sender))
            .map_err(|_| Error::NetworkClosed)?;
        receiver.await.map_err(|_| Error::NetworkClosed)
    }
}

/// Implementation of a [crate::Receiver] for the simulated network.
#[derive(Debug)]
pub struct Receiver {
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl crate::Receiver for Receiver {
    type Error = Error;

    async fn recv(&mut self) -> Result<Message, Error> {
        self.receiver.next().await.ok_or(Error::NetworkClosed)
    }
}
