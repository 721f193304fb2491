use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;

use crate::kernel::message::Envelope;

/// Serialized envelopes flowing from the worker to the UI side.
pub type InboundReceiver = tokio::sync::mpsc::Receiver<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    NotConnected,
    Full,
    Closed,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::NotConnected => write!(f, "no worker channel established"),
            ChannelError::Full => write!(f, "worker channel is full"),
            ChannelError::Closed => write!(f, "worker channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl<T> From<TrySendError<T>> for ChannelError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        }
    }
}

/// Outbound half of a duplex transport to the worker. Must never block.
pub trait MessageChannel {
    fn post(&self, payload: String) -> Result<(), ChannelError>;
}

/// Posting side of the message system, handed to services at construction.
#[derive(Clone, Default)]
pub struct MessageSystemHandle {
    channel: Rc<RefCell<Option<Box<dyn MessageChannel>>>>,
}

impl MessageSystemHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.borrow().is_some()
    }

    pub(crate) fn connect(&self, channel: Box<dyn MessageChannel>) -> Option<Box<dyn MessageChannel>> {
        self.channel.borrow_mut().replace(channel)
    }

    pub(crate) fn disconnect(&self) -> Option<Box<dyn MessageChannel>> {
        self.channel.borrow_mut().take()
    }

    /// Fire and forget; failures are logged, never returned.
    pub fn post_message(&self, envelope: Envelope) {
        if let Err(e) = self.try_post(&envelope) {
            tracing::warn!(
                error = %e,
                kind = envelope.kind.as_str(),
                action = ?envelope.action,
                "dropped outbound message"
            );
        }
    }

    /// Posts an untyped envelope after checking its `type`.
    pub fn post_value(&self, value: Value) {
        match Envelope::from_value(value) {
            Ok(envelope) => self.post_message(envelope),
            Err(e) => tracing::warn!(error = %e, "dropped malformed outbound message"),
        }
    }

    pub fn try_post(&self, envelope: &Envelope) -> Result<(), PostError> {
        let channel = self.channel.borrow();
        let Some(channel) = channel.as_ref() else {
            return Err(PostError::Channel(ChannelError::NotConnected));
        };
        let payload = envelope.encode().map_err(PostError::Encode)?;
        channel.post(payload).map_err(PostError::Channel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    Channel(ChannelError),
    Encode(crate::kernel::message::ProtocolError),
}

impl std::fmt::Display for PostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostError::Channel(e) => write!(f, "{}", e),
            PostError::Encode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PostError {}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/services/bus.rs"]
mod tests;
