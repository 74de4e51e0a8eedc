use crate::{Error, Scheme};
use prometheus_client::registry::Registry;
use std::sync::{Arc, Mutex};

/// Configuration for the [crate::Engine].
pub struct Config<S: Scheme> {
    /// Threshold scheme holding this participant's key share.
    pub scheme: S,

    /// The session identifier included in every signed context.
    /// Used to prevent replay of shares across protocol instances.
    pub namespace: Vec<u8>,

    /// Index of this participant.
    pub me: u32,

    /// Number of participants (`n`).
    pub participants: u32,

    /// Maximum number of faulty participants tolerated (`f`).
    pub faults: u32,

    /// Number of requests to buffer before blocking callers.
    pub mailbox_size: usize,

    /// Whether shares are sent as priority.
    pub priority: bool,

    /// Registry for engine metrics.
    pub registry: Arc<Mutex<Registry>>,
}

impl<S: Scheme> Config<S> {
    /// Checks that the configuration matches the threshold scheme.
    pub fn assert(&self) -> Result<(), Error> {
        let threshold = self.scheme.threshold();
        if self.faults.checked_add(1) != Some(threshold) {
            return Err(Error::InvalidConfig(format!(
                "threshold {} must exceed faults {} by one",
                threshold, self.faults
            )));
        }
        let shareholders = self.scheme.participants();
        if shareholders != self.participants {
            return Err(Error::InvalidConfig(format!(
                "shareholders {} must equal participants {}",
                shareholders, self.participants
            )));
        }
        if self.me >= self.participants {
            return Err(Error::InvalidConfig(format!(
                "index {} out of range for {} participants",
                self.me, self.participants
            )));
        }
        if self.scheme.index() != self.me {
            return Err(Error::InvalidConfig(format!(
                "share index {} does not match index {}",
                self.scheme.index(),
                self.me
            )));
        }
        if self.mailbox_size == 0 {
            return Err(Error::InvalidConfig("mailbox size must be positive".into()));
        }
        Ok(())
    }
}
