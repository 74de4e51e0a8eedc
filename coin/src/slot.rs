use futures::channel::oneshot;

/// Holds the coin of a round once it is resolved and notifies everyone waiting for it.
#[derive(Default)]
pub struct Slot {
    value: Option<bool>,
    waiters: Vec<oneshot::Sender<bool>>,
}

impl Slot {
    /// Returns the resolved coin, if any.
    pub fn value(&self) -> Option<bool> {
        self.value
    }

    /// Delivers the coin to `waiter` now if resolved, or once it is.
    pub fn subscribe(&mut self, waiter: oneshot::Sender<bool>) {
        match self.value {
            Some(coin) => {
                let _ = waiter.send(coin);
            }
            None => {
                self.waiters.retain(|waiter| !waiter.is_canceled());
                self.waiters.push(waiter);
            }
        }
    }

    /// Resolves the slot, waking all waiters.
    ///
    /// Returns false (and changes nothing) if the slot was already resolved.
    pub fn resolve(&mut self, coin: bool) -> bool {
        if self.value.is_some() {
            return false;
        }
        self.value = Some(coin);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(coin);
        }
        true
    }
}
