//! Keyboard shortcuts: key combination -> action, evaluated against the
//! cached document cursor.
//!
//! The cache is kept fresh by the message path (`initialize`, `data`,
//! `navigation`); the key path (`handle_key`) only reads it.

use serde::Serialize;

use crate::core::event::{is_key_down, Key, KeyCode, KeyEvent};
use crate::core::service::Result as ServiceResult;
use crate::core::{ActionRegistry, Service, ServiceAction, ServiceConfig};
use crate::kernel::dictionary::DataDictionary;
use crate::kernel::message::{DataAction, Envelope, MessageType, ProtocolError};
use crate::kernel::services::bus::MessageSystemHandle;
use crate::kernel::services::ports::settings::ShortcutRule;

use super::settings::parse_keybinding;

pub const SHORTCUTS_ID: &str = "dtool::shortcuts-service";

/// What an invoked shortcut sees.
pub struct ShortcutContext<'a> {
    pub action_id: &'a str,
    pub name: &'a str,
    pub keys: Key,
    pub active_dictionary_id: Option<&'a str>,
    pub data_dictionary: Option<&'a DataDictionary>,
    pub messages: &'a MessageSystemHandle,
}

impl ShortcutContext<'_> {
    /// The cursor, if it still names a node of the cached dictionary.
    pub fn active_node(&self) -> Option<&str> {
        let id = self.active_dictionary_id?;
        self.data_dictionary
            .is_some_and(|dictionary| dictionary.contains(id))
            .then_some(id)
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.data_dictionary
            .is_some_and(|dictionary| dictionary.root_id() == id)
    }
}

type ShortcutCallback = Box<dyn Fn(&ShortcutContext<'_>)>;

pub struct ShortcutAction {
    id: String,
    name: String,
    keys: Key,
    callback: ShortcutCallback,
}

impl ShortcutAction {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        keys: Key,
        callback: impl Fn(&ShortcutContext<'_>) + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            keys,
            callback: Box::new(callback),
        }
    }

    pub fn with_keys(mut self, keys: Key) -> Self {
        self.keys = keys;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> Key {
        self.keys
    }

    pub fn invoke(&self, context: &ShortcutContext<'_>) {
        (self.callback)(context)
    }
}

impl ServiceAction for ShortcutAction {
    type Criterion = KeyEvent;

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, event: &KeyEvent) -> bool {
        is_key_down(event) && Key::from(*event) == self.keys
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutActionConfig {
    pub id: String,
    pub name: String,
    pub keys: String,
    pub active_dictionary_id: Option<String>,
    pub data_dictionary: Option<DataDictionary>,
}

/// Returned by `get_action_config` for an unknown id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionNotFound {
    pub error: &'static str,
}

impl Default for ActionNotFound {
    fn default() -> Self {
        Self {
            error: "No such action found.",
        }
    }
}

impl std::fmt::Display for ActionNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ActionNotFound {}

pub struct Shortcuts {
    messages: MessageSystemHandle,
    actions: ActionRegistry<ShortcutAction>,
    active_dictionary_id: Option<String>,
    data_dictionary: Option<DataDictionary>,
}

impl Shortcuts {
    /// A service with the built-in actions.
    pub fn new(messages: MessageSystemHandle) -> Self {
        Self::with_actions(messages, default_actions())
    }

    pub fn with_actions(
        messages: MessageSystemHandle,
        actions: impl IntoIterator<Item = ShortcutAction>,
    ) -> Self {
        Self {
            messages,
            actions: actions.into_iter().collect(),
            active_dictionary_id: None,
            data_dictionary: None,
        }
    }

    /// Applies user key overrides. Unknown ids and unparsable keys are skipped.
    pub fn with_rules(mut self, rules: &[ShortcutRule]) -> Self {
        for rule in rules {
            let Some(keys) = parse_keybinding(&rule.key) else {
                tracing::warn!(id = %rule.id, key = %rule.key, "invalid shortcut key");
                continue;
            };
            if !self.actions.replace_with(&rule.id, |action| action.with_keys(keys)) {
                tracing::warn!(id = %rule.id, "no shortcut action with this id");
            }
        }
        self
    }

    pub fn register_action(&mut self, action: ShortcutAction) {
        self.actions.register(action);
    }

    pub fn actions(&self) -> &ActionRegistry<ShortcutAction> {
        &self.actions
    }

    pub fn active_dictionary_id(&self) -> Option<&str> {
        self.active_dictionary_id.as_deref()
    }

    pub fn data_dictionary(&self) -> Option<&DataDictionary> {
        self.data_dictionary.as_ref()
    }

    /// Invokes every action bound to `event`. Returns how many ran.
    pub fn handle_key(&self, event: &KeyEvent) -> usize {
        let mut invoked = 0;
        for action in self.actions.matching(event) {
            tracing::debug!(action = action.id(), "shortcut matched");
            action.invoke(&self.context(action));
            invoked += 1;
        }
        invoked
    }

    pub fn get_action_config(&self, id: &str) -> Result<ShortcutActionConfig, ActionNotFound> {
        self.actions
            .find(id)
            .map(|action| self.action_config(action))
            .ok_or_else(ActionNotFound::default)
    }

    /// Posts one `custom`/`initialize` message listing every action.
    pub fn announce(&self) -> ServiceResult<()> {
        let configs: Vec<ShortcutActionConfig> = self
            .actions
            .iter()
            .map(|action| self.action_config(action))
            .collect();
        let shortcuts =
            serde_json::to_value(configs).map_err(|e| ProtocolError::Encode(e.to_string()))?;

        self.messages.post_message(
            Envelope::custom(SHORTCUTS_ID, "initialize")
                .with_originator(SHORTCUTS_ID)
                .with_extra("shortcuts", shortcuts),
        );
        Ok(())
    }

    fn context<'a>(&'a self, action: &'a ShortcutAction) -> ShortcutContext<'a> {
        ShortcutContext {
            action_id: action.id(),
            name: action.name(),
            keys: action.keys(),
            active_dictionary_id: self.active_dictionary_id.as_deref(),
            data_dictionary: self.data_dictionary.as_ref(),
            messages: &self.messages,
        }
    }

    fn action_config(&self, action: &ShortcutAction) -> ShortcutActionConfig {
        ShortcutActionConfig {
            id: action.id().to_string(),
            name: action.name().to_string(),
            keys: action.keys().to_string(),
            active_dictionary_id: self.active_dictionary_id.clone(),
            data_dictionary: self.data_dictionary.clone(),
        }
    }
}

impl Service for Shortcuts {
    fn id(&self) -> &str {
        SHORTCUTS_ID
    }

    fn config(&self) -> ServiceConfig {
        ServiceConfig::new(SHORTCUTS_ID).with_event_listener_type("keydown")
    }

    fn registered_actions(&self) -> Vec<String> {
        self.actions.ids()
    }

    fn handle_message(&mut self, envelope: &Envelope) -> ServiceResult<()> {
        match envelope.kind {
            MessageType::Initialize => {
                self.active_dictionary_id = envelope.active_dictionary_id.clone();
                self.data_dictionary = envelope.data_dictionary.clone();
                self.announce()
            }
            MessageType::Data => {
                if let Some(dictionary) = &envelope.data_dictionary {
                    self.data_dictionary = Some(dictionary.clone());
                }
                Ok(())
            }
            MessageType::Navigation => {
                if let Some(id) = &envelope.active_dictionary_id {
                    self.active_dictionary_id = Some(id.clone());
                }
                Ok(())
            }
            MessageType::Custom | MessageType::Error => Ok(()),
        }
    }
}

pub fn default_actions() -> Vec<ShortcutAction> {
    vec![
        ShortcutAction::new("delete", "Delete", Key::simple(KeyCode::Delete), |ctx| {
            post_data_action(ctx, DataAction::Remove)
        }),
        ShortcutAction::new("duplicate", "Duplicate", Key::ctrl(KeyCode::Char('d')), |ctx| {
            post_data_action(ctx, DataAction::Duplicate)
        }),
        ShortcutAction::new("select-parent", "Select parent", Key::alt(KeyCode::Up), |ctx| {
            let Some(id) = ctx.active_node() else {
                return;
            };
            let Some(parent) = ctx.data_dictionary.and_then(|d| d.parent_of(id)) else {
                return;
            };
            ctx.messages.post_message(
                Envelope::navigation_update(parent, None).with_originator(SHORTCUTS_ID),
            );
        }),
    ]
}

fn post_data_action(ctx: &ShortcutContext<'_>, action: DataAction) {
    let Some(id) = ctx.active_node() else {
        return;
    };
    if ctx.is_root(id) {
        tracing::debug!(action = action.as_str(), "shortcut skipped on root node");
        return;
    }
    ctx.messages
        .post_message(Envelope::data(action, id).with_originator(SHORTCUTS_ID));
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/shortcuts.rs"]
mod tests;
