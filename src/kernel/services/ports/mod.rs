//! Service ports: pure data contracts.

pub mod settings;

pub use settings::{Settings, ShortcutRule, DEFAULT_CHANNEL_CAPACITY};
