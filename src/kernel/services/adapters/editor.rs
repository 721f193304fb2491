//! Bridge between the message system and an external text editor.
//!
//! The editor is created after the adapter, so its callbacks are late-bound.
//! Programmatic syncs run under an "external" flag; editor change events that
//! fire while it is set are ignored, which breaks the
//! change -> data write -> sync -> change loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::core::action::Result as ActionResult;
use crate::core::service::Result as ServiceResult;
use crate::core::{ActionError, ActionRegistry, LateBound, Service, ServiceAction, ServiceConfig};
use crate::kernel::dictionary::DataDictionary;
use crate::kernel::message::{Envelope, MessageType};
use crate::kernel::services::bus::MessageSystemHandle;

pub const EDITOR_ADAPTER_ID: &str = "dtool::editor-adapter";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Hooks into the editor host.
pub struct EditorCallbacks {
    get_model_value: Box<dyn Fn() -> Vec<String>>,
    update_model_value: Box<dyn Fn(Vec<String>, bool)>,
    update_model_position: Box<dyn Fn(Option<&str>) -> Position>,
}

impl EditorCallbacks {
    pub fn new(
        get_model_value: impl Fn() -> Vec<String> + 'static,
        update_model_value: impl Fn(Vec<String>, bool) + 'static,
        update_model_position: impl Fn(Option<&str>) -> Position + 'static,
    ) -> Self {
        Self {
            get_model_value: Box::new(get_model_value),
            update_model_value: Box::new(update_model_value),
            update_model_position: Box::new(update_model_position),
        }
    }

    pub fn get_model_value(&self) -> Vec<String> {
        (self.get_model_value)()
    }

    pub fn update_model_value(&self, lines: Vec<String>, is_external: bool) {
        (self.update_model_value)(lines, is_external)
    }

    pub fn update_model_position(&self, dictionary_id: Option<&str>) -> Position {
        (self.update_model_position)(dictionary_id)
    }
}

/// State shared between the adapter and its change handle. Never borrowed
/// across a callback, so the editor may call back synchronously.
struct EditorSync {
    messages: MessageSystemHandle,
    applying_external: Cell<bool>,
    active_dictionary_id: RefCell<Option<String>>,
}

impl EditorSync {
    fn begin_external(&self) -> ExternalGuard<'_> {
        let previous = self.applying_external.replace(true);
        ExternalGuard {
            sync: self,
            previous,
        }
    }

    fn post_model(&self, lines: &[String]) -> bool {
        if self.applying_external.get() {
            tracing::trace!("ignoring editor change during external update");
            return false;
        }
        let Some(id) = self.active_dictionary_id.borrow().clone() else {
            return false;
        };
        let data: Value = match serde_json::from_str(&lines.join("\n")) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = %e, "editor content is not valid JSON");
                return false;
            }
        };
        self.messages
            .post_message(Envelope::data_update(id, data).with_originator(EDITOR_ADAPTER_ID));
        true
    }
}

struct ExternalGuard<'a> {
    sync: &'a EditorSync,
    previous: bool,
}

impl Drop for ExternalGuard<'_> {
    fn drop(&mut self) {
        self.sync.applying_external.set(self.previous);
    }
}

pub struct EditorActionContext<'a> {
    pub action_id: &'a str,
    pub message_type: MessageType,
    pub active_dictionary_id: Option<&'a str>,
    pub data_dictionary: Option<&'a DataDictionary>,
    pub callbacks: &'a EditorCallbacks,
    sync: &'a EditorSync,
}

impl EditorActionContext<'_> {
    /// Replaces the editor content without echoing it back as a data write.
    pub fn apply_external(&self, lines: Vec<String>) {
        let _guard = self.sync.begin_external();
        self.callbacks.update_model_value(lines, true);
    }

    pub fn messages(&self) -> &MessageSystemHandle {
        &self.sync.messages
    }
}

type EditorEffect = Box<dyn Fn(&EditorActionContext<'_>) -> ActionResult<()>>;

pub struct EditorAdapterAction {
    id: String,
    message_type: MessageType,
    callbacks: LateBound<Rc<EditorCallbacks>>,
    effect: EditorEffect,
}

impl EditorAdapterAction {
    pub fn new(
        id: impl Into<String>,
        message_type: MessageType,
        effect: impl Fn(&EditorActionContext<'_>) -> ActionResult<()> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            message_type,
            callbacks: LateBound::unbound("editor callbacks"),
            effect: Box::new(effect),
        }
    }

    /// Renders the active node's data into the editor.
    pub fn sync_value(message_type: MessageType) -> Self {
        Self::new(
            format!("sync-value.{}", message_type.as_str()),
            message_type,
            |ctx| {
                let Some(node) = ctx
                    .active_dictionary_id
                    .zip(ctx.data_dictionary)
                    .and_then(|(id, dictionary)| dictionary.get(id))
                else {
                    return Ok(());
                };
                let text = serde_json::to_string_pretty(&node.data).map_err(|e| {
                    ActionError::Failed {
                        action: ctx.action_id.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                ctx.apply_external(text.lines().map(str::to_string).collect());
                Ok(())
            },
        )
    }

    /// Moves the editor cursor to the active node.
    pub fn sync_position() -> Self {
        Self::new("sync-position", MessageType::Navigation, |ctx| {
            let position = ctx.callbacks.update_model_position(ctx.active_dictionary_id);
            tracing::trace!(line = position.line, column = position.column, "editor position synced");
            Ok(())
        })
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn bind(&mut self, callbacks: Rc<EditorCallbacks>) {
        self.callbacks.bind(callbacks);
    }

    pub fn is_bound(&self) -> bool {
        self.callbacks.is_bound()
    }

    fn invoke(
        &self,
        sync: &EditorSync,
        active_dictionary_id: Option<&str>,
        data_dictionary: Option<&DataDictionary>,
    ) -> ActionResult<()> {
        let callbacks = self.callbacks.get()?;
        let context = EditorActionContext {
            action_id: &self.id,
            message_type: self.message_type,
            active_dictionary_id,
            data_dictionary,
            callbacks,
            sync,
        };
        (self.effect)(&context)
    }
}

impl ServiceAction for EditorAdapterAction {
    type Criterion = MessageType;

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, message_type: &MessageType) -> bool {
        self.message_type == *message_type
    }
}

/// Handed to the editor host; call it from the editor's change event.
#[derive(Clone)]
pub struct EditorChangeHandle {
    sync: Rc<EditorSync>,
}

impl EditorChangeHandle {
    /// Posts the edited content as a `data`/`update` for the active node.
    /// Returns false when nothing was posted.
    pub fn model_changed(&self, lines: &[String]) -> bool {
        self.sync.post_model(lines)
    }
}

pub struct EditorAdapter {
    sync: Rc<EditorSync>,
    actions: ActionRegistry<EditorAdapterAction>,
    callbacks: Option<Rc<EditorCallbacks>>,
    data_dictionary: Option<DataDictionary>,
}

impl EditorAdapter {
    pub fn new(messages: MessageSystemHandle) -> Self {
        Self {
            sync: Rc::new(EditorSync {
                messages,
                applying_external: Cell::new(false),
                active_dictionary_id: RefCell::new(None),
            }),
            actions: ActionRegistry::new(),
            callbacks: None,
            data_dictionary: None,
        }
    }

    pub fn with_default_actions(messages: MessageSystemHandle) -> Self {
        let mut adapter = Self::new(messages);
        adapter.register_action(EditorAdapterAction::sync_value(MessageType::Initialize));
        adapter.register_action(EditorAdapterAction::sync_value(MessageType::Data));
        adapter.register_action(EditorAdapterAction::sync_value(MessageType::Navigation));
        adapter.register_action(EditorAdapterAction::sync_position());
        adapter
    }

    /// Adds an action; it is bound right away if the editor already is.
    pub fn register_action(&mut self, mut action: EditorAdapterAction) {
        if let Some(callbacks) = &self.callbacks {
            action.bind(Rc::clone(callbacks));
        }
        self.actions.register(action);
    }

    /// Second phase of construction: supplies the editor to every action.
    pub fn bind(&mut self, callbacks: EditorCallbacks) {
        let callbacks = Rc::new(callbacks);
        for action in self.actions.iter_mut() {
            action.bind(Rc::clone(&callbacks));
        }
        self.callbacks = Some(callbacks);
    }

    pub fn is_bound(&self) -> bool {
        self.callbacks.is_some()
    }

    pub fn change_handle(&self) -> EditorChangeHandle {
        EditorChangeHandle {
            sync: Rc::clone(&self.sync),
        }
    }

    pub fn actions(&self) -> &ActionRegistry<EditorAdapterAction> {
        &self.actions
    }

    pub fn active_dictionary_id(&self) -> Option<String> {
        self.sync.active_dictionary_id.borrow().clone()
    }

    /// Reads the whole editor model and posts it, as a change event would.
    pub fn commit_model(&self) -> ActionResult<bool> {
        let callbacks = self
            .callbacks
            .as_ref()
            .ok_or(ActionError::NotBound("editor callbacks"))?;
        Ok(self.sync.post_model(&callbacks.get_model_value()))
    }

    fn cache(&mut self, envelope: &Envelope) {
        if let Some(dictionary) = &envelope.data_dictionary {
            self.data_dictionary = Some(dictionary.clone());
        }
        if let Some(id) = &envelope.active_dictionary_id {
            *self.sync.active_dictionary_id.borrow_mut() = Some(id.clone());
        }
    }
}

impl Service for EditorAdapter {
    fn id(&self) -> &str {
        EDITOR_ADAPTER_ID
    }

    fn config(&self) -> ServiceConfig {
        ServiceConfig::new(EDITOR_ADAPTER_ID)
    }

    fn registered_actions(&self) -> Vec<String> {
        self.actions.ids()
    }

    fn handle_message(&mut self, envelope: &Envelope) -> ServiceResult<()> {
        if matches!(
            envelope.kind,
            MessageType::Initialize | MessageType::Data | MessageType::Navigation
        ) {
            self.cache(envelope);
        }
        // The editor already shows what it sent; replaying the echo would
        // overwrite newer edits.
        if envelope.originator_id() == Some(EDITOR_ADAPTER_ID) {
            return Ok(());
        }

        let active = self.active_dictionary_id();
        let mut first_error = None;
        for action in self.actions.matching(&envelope.kind) {
            if let Err(e) = action.invoke(&self.sync, active.as_deref(), self.data_dictionary.as_ref()) {
                tracing::error!(action = action.id(), error = %e, "editor action failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/editor.rs"]
mod tests;
