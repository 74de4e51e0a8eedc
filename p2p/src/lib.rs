//! Send messages between indexed participants.
//!
//! Participants are identified by their index in `[0, n)`. A [Sender] hands a message
//! to the transport for a set of [Recipients] and a [Receiver] yields messages tagged with
//! the (authenticated) index of the participant that sent them.
//!
//! # Status
//!
//! `commoncoin-p2p` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use bytes::Bytes;
use std::{error::Error as StdError, fmt::Debug, future::Future};

pub mod simulated;

/// Tuple representing a message received from a given participant.
pub type Message = (u32, Bytes);

/// Enum indicating the set of recipients to send a message to.
///
/// [Recipients::All] never includes the sender itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipients {
    All,
    Some(Vec<u32>),
    One(u32),
}

/// Interface for sending messages to a set of recipients.
pub trait Sender: Clone + Debug + Send + 'static {
    /// Error that can occur when sending a message.
    type Error: Debug + StdError + Send + Sync;

    /// Send a message to a set of recipients.
    ///
    /// Returns the participants the message was handed off to. Delivery is not guaranteed.
    fn send(
        &mut self,
        recipients: Recipients,
        message: Bytes,
        priority: bool,
    ) -> impl Future<Output = Result<Vec<u32>, Self::Error>> + Send;
}

/// Interface for receiving messages from arbitrary participants.
pub trait Receiver: Debug + Send + 'static {
    /// Error that can occur when receiving a message.
    ///
    /// Any error indicates the transport is closed.
    type Error: Debug + StdError + Send + Sync;

    /// Receive a message from an arbitrary participant.
    fn recv(&mut self) -> impl Future<Output = Result<Message, Self::Error>> + Send;
}
