//! Core framework shared by every service.
//!
//! - Service: registration contract + ordered registry
//! - Action: matchable/invokable units owned by services
//! - Event: keyboard input normalization

pub mod action;
pub mod event;
pub mod service;

pub use action::{ActionError, ActionRegistry, LateBound, ServiceAction};
pub use event::{Key, KeyCode, KeyEvent, KeyModifiers};
pub use service::{Service, ServiceConfig, ServiceEntry, ServiceError, ServiceRegistry};
