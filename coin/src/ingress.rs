use crate::Error;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};

/// Requests handled by the [crate::Engine].
pub enum Message {
    Coin {
        round: u64,
        response: oneshot::Sender<bool>,
    },
}

/// Handle used to request coins from the [crate::Engine].
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// Returns the coin for `round`.
    ///
    /// The first request for a round broadcasts this participant's share. The call waits
    /// until `f+1` valid shares are collected and returns [Error::Shutdown] if the engine
    /// stops first.
    pub async fn get_coin(&mut self, round: u64) -> Result<bool, Error> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(Message::Coin { round, response })
            .await
            .map_err(|_| Error::Shutdown)?;
        receiver.await.map_err(|_| Error::Shutdown)
    }
}
