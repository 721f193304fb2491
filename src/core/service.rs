use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::action::ActionError;
use crate::kernel::message::{Envelope, ProtocolError};

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    /// The service was already borrowed (e.g. re-entered while handling a message).
    Busy(String),
    Action(ActionError),
    Protocol(ProtocolError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::NotFound(id) => write!(f, "Service not found: {}", id),
            ServiceError::Busy(id) => write!(f, "Service busy: {}", id),
            ServiceError::Action(e) => write!(f, "Service action error: {}", e),
            ServiceError::Protocol(e) => write!(f, "Service protocol error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ActionError> for ServiceError {
    fn from(e: ActionError) -> Self {
        ServiceError::Action(e)
    }
}

impl From<ProtocolError> for ServiceError {
    fn from(e: ProtocolError) -> Self {
        ServiceError::Protocol(e)
    }
}

/// Snapshot of a service's registration, returned by `get_config_by_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_listener_type: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl ServiceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event_listener_type: None,
            options: serde_json::Value::Null,
        }
    }

    pub fn with_event_listener_type(mut self, kind: impl Into<String>) -> Self {
        self.event_listener_type = Some(kind.into());
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// A pluggable participant of the message system.
pub trait Service {
    fn id(&self) -> &str;

    fn config(&self) -> ServiceConfig;

    /// Ids of the owned actions, in match order.
    fn registered_actions(&self) -> Vec<String>;

    /// Called for every inbound envelope. Unknown `type`/`action` pairs are no-ops.
    fn handle_message(&mut self, envelope: &Envelope) -> Result<()>;
}

pub struct ServiceEntry {
    pub config: ServiceConfig,
    pub actions: Vec<String>,
    service: Rc<RefCell<dyn Service>>,
}

impl ServiceEntry {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn service(&self) -> Rc<RefCell<dyn Service>> {
        Rc::clone(&self.service)
    }
}

/// Services keyed by id, iterated in registration order.
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
    index: FxHashMap<String, usize>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Records the service. An existing entry with the same id is replaced in
    /// place; returns true in that case.
    pub fn register(&mut self, service: Rc<RefCell<dyn Service>>) -> Result<bool> {
        let (config, actions) = {
            let borrowed = service
                .try_borrow()
                .map_err(|_| ServiceError::Busy("<registering>".to_string()))?;
            (borrowed.config(), borrowed.registered_actions())
        };
        let id = config.id.clone();
        let entry = ServiceEntry {
            config,
            actions,
            service,
        };

        if let Some(&index) = self.index.get(&id) {
            self.entries[index] = entry;
            return Ok(true);
        }

        self.index.insert(id, self.entries.len());
        self.entries.push(entry);
        Ok(false)
    }

    pub fn get(&self, id: &str) -> Option<&ServiceEntry> {
        self.index.get(id).map(|&index| &self.entries[index])
    }

    pub fn config(&self, id: &str) -> Option<&ServiceConfig> {
        self.get(id).map(|entry| &entry.config)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ServiceEntry> {
        let index = self.index.remove(id)?;
        let entry = self.entries.remove(index);
        for slot in self.index.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Some(entry)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/core/service.rs"]
mod tests;
