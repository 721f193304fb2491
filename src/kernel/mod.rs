//! Headless message-system core (envelopes, dictionaries, worker store, services).

pub mod dictionary;
pub mod message;
pub mod services;
pub mod store;

pub use dictionary::{DataDictionary, NodeParent, NodeRecord, SchemaDictionary};
pub use message::{
    DataAction, Envelope, MessageOptions, MessageType, NavigationAction, ProtocolError,
};
pub use services::{MessageChannel, MessageSystem, MessageSystemConfig, MessageSystemHandle};
pub use store::{DataStore, DispatchResult, StoreError};
