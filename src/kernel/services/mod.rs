//! Services layer (ports + adapters).
//!
//! - `bus`: outbound channel contract and the posting handle given to services.
//! - `host`: the message-system coordinator (listener/service fan-out).
//! - `ports`: pure contracts/types (settings).
//! - `adapters`: runtime specific implementations (worker thread, concrete services).

pub mod adapters;
pub mod bus;
pub mod host;
pub mod ports;

pub use bus::{ChannelError, InboundReceiver, MessageChannel, MessageSystemHandle, PostError};
pub use host::{MessageListener, MessageSystem, MessageSystemConfig};
