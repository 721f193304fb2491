use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::core::service::Result as ServiceResult;
use crate::core::{Service, ServiceConfig, ServiceError, ServiceRegistry};
use crate::kernel::dictionary::{DataDictionary, SchemaDictionary};
use crate::kernel::message::Envelope;

use super::bus::{InboundReceiver, MessageChannel, MessageSystemHandle};

/// A plain observer of inbound envelopes.
pub trait MessageListener {
    fn on_message(&mut self, envelope: &Envelope);
}

impl<F: FnMut(&Envelope)> MessageListener for F {
    fn on_message(&mut self, envelope: &Envelope) {
        self(envelope)
    }
}

#[derive(Clone)]
enum Subscriber {
    Listener(Rc<RefCell<dyn MessageListener>>),
    Service(String),
}

#[derive(Default)]
pub struct MessageSystemConfig {
    pub channel: Option<Box<dyn MessageChannel>>,
    pub data_dictionary: Option<DataDictionary>,
    pub schema_dictionary: Option<SchemaDictionary>,
}

/// The UI-side coordinator: owns the worker channel and fans every inbound
/// envelope out to listeners and services in registration order.
pub struct MessageSystem {
    handle: MessageSystemHandle,
    subscribers: RefCell<Vec<Subscriber>>,
    services: RefCell<ServiceRegistry>,
    pending_initialize: RefCell<Option<Envelope>>,
}

impl MessageSystem {
    pub fn new(config: MessageSystemConfig) -> Self {
        let pending = match (config.data_dictionary, config.schema_dictionary) {
            (Some(data), Some(schema)) => Some(Envelope::initialize(data, schema)),
            (Some(data), None) => Some(Envelope::initialize(data, SchemaDictionary::new())),
            _ => None,
        };

        let system = Self {
            handle: MessageSystemHandle::new(),
            subscribers: RefCell::new(Vec::new()),
            services: RefCell::new(ServiceRegistry::new()),
            pending_initialize: RefCell::new(pending),
        };
        if let Some(channel) = config.channel {
            system.connect(channel);
        }
        system
    }

    pub fn handle(&self) -> MessageSystemHandle {
        self.handle.clone()
    }

    /// Establishes (or replaces) the worker channel and flushes a pending `initialize`.
    pub fn connect(&self, channel: Box<dyn MessageChannel>) {
        if self.handle.connect(channel).is_some() {
            tracing::debug!("replaced worker channel");
        }
        if let Some(initialize) = self.pending_initialize.borrow_mut().take() {
            self.handle.post_message(initialize);
        }
    }

    pub fn disconnect(&self) -> Option<Box<dyn MessageChannel>> {
        self.handle.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    pub fn post_message(&self, envelope: Envelope) {
        self.handle.post_message(envelope);
    }

    pub fn post_value(&self, value: serde_json::Value) {
        self.handle.post_value(value);
    }

    /// Appends a listener. Adding the same listener twice delivers twice.
    pub fn add<L: MessageListener + 'static>(&self, listener: Rc<RefCell<L>>) {
        self.add_shared(listener);
    }

    pub fn add_shared(&self, listener: Rc<RefCell<dyn MessageListener>>) {
        self.subscribers
            .borrow_mut()
            .push(Subscriber::Listener(listener));
    }

    pub fn add_fn(&self, f: impl FnMut(&Envelope) + 'static) {
        self.add(Rc::new(RefCell::new(f)));
    }

    /// Records the service's config and subscribes its handler. Registering an
    /// id again replaces the earlier service without changing its position.
    pub fn register_service<S: Service + 'static>(&self, service: Rc<RefCell<S>>) -> ServiceResult<()> {
        let service: Rc<RefCell<dyn Service>> = service;
        let id = service
            .try_borrow()
            .map_err(|_| ServiceError::Busy("<registering>".to_string()))?
            .id()
            .to_string();

        let replaced = self.services.borrow_mut().register(service)?;
        if replaced {
            tracing::debug!(service = %id, "re-registered service");
        } else {
            self.subscribers
                .borrow_mut()
                .push(Subscriber::Service(id.clone()));
            tracing::debug!(service = %id, "registered service");
        }
        Ok(())
    }

    /// Builds the service with a handle to this system and registers it.
    pub fn register<S: Service + 'static>(&self, service: S) -> ServiceResult<Rc<RefCell<S>>> {
        let service = Rc::new(RefCell::new(service));
        self.register_service(Rc::clone(&service))?;
        Ok(service)
    }

    pub fn unregister_service(&self, id: &str) -> bool {
        let removed = self.services.borrow_mut().remove(id).is_some();
        if removed {
            self.subscribers
                .borrow_mut()
                .retain(|s| !matches!(s, Subscriber::Service(sid) if sid == id));
        }
        removed
    }

    pub fn get_config_by_id(&self, id: &str) -> Option<ServiceConfig> {
        self.services.borrow().config(id).cloned()
    }

    pub fn registered_actions(&self, id: &str) -> Option<Vec<String>> {
        self.services.borrow().get(id).map(|e| e.actions.clone())
    }

    pub fn service_ids(&self) -> Vec<String> {
        self.services
            .borrow()
            .iter()
            .map(|e| e.id().to_string())
            .collect()
    }

    /// Inbound delivery for one serialized envelope (the `onmessage` path).
    pub fn receive(&self, payload: &str) {
        match Envelope::decode(payload) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(e) => tracing::warn!(error = %e, "dropped malformed inbound message"),
        }
    }

    /// Fans the envelope out to every subscriber, in registration order. A
    /// failing or panicking subscriber is logged and skipped.
    pub fn dispatch(&self, envelope: &Envelope) {
        let subscribers = self.subscribers.borrow().clone();
        for subscriber in subscribers {
            match subscriber {
                Subscriber::Listener(listener) => {
                    let Ok(mut listener) = listener.try_borrow_mut() else {
                        tracing::error!(kind = envelope.kind.as_str(), "listener busy, skipped");
                        continue;
                    };
                    let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_message(envelope)));
                    if let Err(panic) = outcome {
                        tracing::error!(panic = %panic_message(&panic), "listener panicked");
                    }
                }
                Subscriber::Service(id) => {
                    let service = self.services.borrow().get(&id).map(|e| e.service());
                    let Some(service) = service else {
                        continue;
                    };
                    if let Err(e) = deliver(&service, envelope) {
                        tracing::error!(service = %id, error = %e, "service failed to handle message");
                    }
                }
            }
        }
    }

    /// Dispatches everything already queued without waiting. Returns the count.
    pub fn pump(&self, inbound: &mut InboundReceiver) -> usize {
        let mut count = 0;
        while let Ok(payload) = inbound.try_recv() {
            self.receive(&payload);
            count += 1;
        }
        count
    }

    /// Dispatches until the worker side closes the channel.
    pub async fn run(&self, inbound: &mut InboundReceiver) {
        while let Some(payload) = inbound.recv().await {
            self.receive(&payload);
        }
        tracing::debug!("inbound channel closed");
    }
}

fn deliver(service: &Rc<RefCell<dyn Service>>, envelope: &Envelope) -> ServiceResult<()> {
    let mut service = service
        .try_borrow_mut()
        .map_err(|_| ServiceError::Busy(envelope.kind.as_str().to_string()))?;
    match catch_unwind(AssertUnwindSafe(|| service.handle_message(envelope))) {
        Ok(result) => result,
        Err(panic) => {
            tracing::error!(
                service = service.id(),
                panic = %panic_message(&panic),
                "service panicked"
            );
            Ok(())
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/services/host.rs"]
mod tests;
