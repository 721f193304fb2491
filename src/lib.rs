//! dtool - message system for a document-tree editing tool
//!
//! Module layout:
//! - core: service/action contracts, key events
//! - kernel: envelopes, dictionaries, worker data store, message system, services

pub mod core;
pub mod kernel;
