//! Worker-side data store: the single writer of the data and schema dictionaries.

use serde::Deserialize;
use serde_json::Value;

use super::dictionary::{set_value_at, DataDictionary, LocationError, NodeRecord, SchemaDictionary};
use super::message::{DataAction, Envelope, MessageOptions, MessageType, NavigationAction};

pub struct DispatchResult {
    pub responses: Vec<Envelope>,
    pub state_changed: bool,
}

impl DispatchResult {
    fn none() -> Self {
        Self {
            responses: Vec::new(),
            state_changed: false,
        }
    }

    fn changed(response: Envelope) -> Self {
        Self {
            responses: vec![response],
            state_changed: true,
        }
    }

    fn unchanged(response: Envelope) -> Self {
        Self {
            responses: vec![response],
            state_changed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotInitialized,
    MissingField(&'static str),
    UnknownNode(String),
    UnknownSchema(String),
    RootRemoval,
    InvalidNode(String),
    BrokenParentLink(String),
    Location(LocationError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotInitialized => write!(f, "data store is not initialized"),
            StoreError::MissingField(field) => write!(f, "message is missing {}", field),
            StoreError::UnknownNode(id) => write!(f, "no such dictionary id: {}", id),
            StoreError::UnknownSchema(id) => write!(f, "no such schema id: {}", id),
            StoreError::RootRemoval => write!(f, "the root node cannot be removed"),
            StoreError::InvalidNode(e) => write!(f, "invalid node: {}", e),
            StoreError::BrokenParentLink(id) => {
                write!(f, "parent link of {} is missing or cyclic", id)
            }
            StoreError::Location(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<LocationError> for StoreError {
    fn from(e: LocationError) -> Self {
        StoreError::Location(e)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewNode {
    #[serde(default)]
    id: Option<String>,
    schema_id: String,
    #[serde(default)]
    data: Value,
}

#[derive(Default)]
pub struct DataStore {
    data_dictionary: Option<DataDictionary>,
    schema_dictionary: SchemaDictionary,
    active_dictionary_id: Option<String>,
    active_navigation_config_id: Option<String>,
    next_id: u64,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_dictionary(&self) -> Option<&DataDictionary> {
        self.data_dictionary.as_ref()
    }

    pub fn schema_dictionary(&self) -> &SchemaDictionary {
        &self.schema_dictionary
    }

    pub fn active_dictionary_id(&self) -> Option<&str> {
        self.active_dictionary_id.as_deref()
    }

    pub fn active_navigation_config_id(&self) -> Option<&str> {
        self.active_navigation_config_id.as_deref()
    }

    pub fn dispatch(&mut self, envelope: Envelope) -> DispatchResult {
        let options = envelope.options.clone();
        let result = match envelope.kind {
            MessageType::Initialize => self.initialize(envelope),
            MessageType::Data => self.dispatch_data(envelope),
            MessageType::Navigation => self.dispatch_navigation(envelope),
            // Custom messages are relayed so every UI-side observer sees them.
            MessageType::Custom => Ok(DispatchResult::unchanged(envelope)),
            MessageType::Error => Ok(DispatchResult::none()),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "data store rejected message");
            DispatchResult::unchanged(
                Envelope::new(MessageType::Error)
                    .with_data(Value::String(e.to_string()))
                    .with_options(options),
            )
        })
    }

    fn initialize(&mut self, envelope: Envelope) -> Result<DispatchResult, StoreError> {
        let data_dictionary = envelope
            .data_dictionary
            .ok_or(StoreError::MissingField("dataDictionary"))?;
        let root_id = data_dictionary.root_id().to_string();
        if !data_dictionary.contains(&root_id) {
            return Err(StoreError::UnknownNode(root_id));
        }
        if let Some(id) = data_dictionary.broken_parent_link() {
            return Err(StoreError::BrokenParentLink(id.to_string()));
        }

        let active = envelope
            .active_dictionary_id
            .filter(|id| data_dictionary.contains(id))
            .unwrap_or(root_id);
        self.schema_dictionary = envelope.schema_dictionary.unwrap_or_default();
        self.data_dictionary = Some(data_dictionary);
        self.active_dictionary_id = Some(active);
        self.active_navigation_config_id = envelope.active_navigation_config_id;

        let mut response = self.snapshot(MessageType::Initialize, envelope.action, envelope.options);
        response.schema_dictionary = Some(self.schema_dictionary.clone());
        Ok(DispatchResult::changed(response))
    }

    fn dispatch_data(&mut self, envelope: Envelope) -> Result<DispatchResult, StoreError> {
        let Some(action) = envelope.data_action() else {
            tracing::debug!(action = ?envelope.action, "ignoring unknown data action");
            return Ok(DispatchResult::none());
        };
        if self.data_dictionary.is_none() {
            return Err(StoreError::NotInitialized);
        }

        let dictionary_id = match action {
            DataAction::Update => self.update_data(&envelope)?,
            DataAction::Add => self.add_data(&envelope)?,
            DataAction::Remove => self.remove_data(&envelope)?,
            DataAction::Duplicate => self.duplicate_data(&envelope)?,
        };

        let response = self
            .snapshot(MessageType::Data, envelope.action, envelope.options)
            .with_dictionary_id(dictionary_id);
        Ok(DispatchResult::changed(response))
    }

    fn dispatch_navigation(&mut self, envelope: Envelope) -> Result<DispatchResult, StoreError> {
        let Some(action) = envelope.navigation_action() else {
            tracing::debug!(action = ?envelope.action, "ignoring unknown navigation action");
            return Ok(DispatchResult::none());
        };
        let dictionary = self.dictionary()?;

        match action {
            NavigationAction::Update => {
                let id = envelope
                    .active_dictionary_id
                    .clone()
                    .ok_or(StoreError::MissingField("activeDictionaryId"))?;
                if !dictionary.contains(&id) {
                    return Err(StoreError::UnknownNode(id));
                }
                self.active_dictionary_id = Some(id);
                self.active_navigation_config_id = envelope.active_navigation_config_id;
                let response =
                    self.snapshot(MessageType::Navigation, envelope.action, envelope.options);
                Ok(DispatchResult::changed(response))
            }
            NavigationAction::Get => {
                let response =
                    self.snapshot(MessageType::Navigation, envelope.action, envelope.options);
                Ok(DispatchResult::unchanged(response))
            }
        }
    }

    fn update_data(&mut self, envelope: &Envelope) -> Result<String, StoreError> {
        let id = required_dictionary_id(envelope)?;
        let data = envelope.data.clone().unwrap_or(Value::Null);
        let location = envelope.data_location.as_deref().unwrap_or("");

        let node = self
            .dictionary_mut()?
            .get_mut(&id)
            .ok_or_else(|| StoreError::UnknownNode(id.clone()))?;
        set_value_at(&mut node.data, location, data)?;
        Ok(id)
    }

    fn add_data(&mut self, envelope: &Envelope) -> Result<String, StoreError> {
        let parent_id = required_dictionary_id(envelope)?;
        let payload = envelope.data.clone().ok_or(StoreError::MissingField("data"))?;
        let node: NewNode =
            serde_json::from_value(payload).map_err(|e| StoreError::InvalidNode(e.to_string()))?;

        if !self.schema_dictionary.contains_key(&node.schema_id) {
            return Err(StoreError::UnknownSchema(node.schema_id));
        }
        if !self.dictionary()?.contains(&parent_id) {
            return Err(StoreError::UnknownNode(parent_id));
        }

        let requested = node.id.filter(|id| {
            self.data_dictionary
                .as_ref()
                .is_some_and(|dictionary| !dictionary.contains(id))
        });
        let id = match requested {
            Some(id) => id,
            None => self.next_node_id(&node.schema_id)?,
        };
        let location = envelope.data_location.clone().unwrap_or_default();
        let record = NodeRecord::new(node.schema_id, node.data).with_parent(parent_id, location);
        self.dictionary_mut()?.insert(id.clone(), record);
        Ok(id)
    }

    fn remove_data(&mut self, envelope: &Envelope) -> Result<String, StoreError> {
        let id = required_dictionary_id(envelope)?;
        let dictionary = self.dictionary()?;
        if id == dictionary.root_id() {
            return Err(StoreError::RootRemoval);
        }
        if !dictionary.contains(&id) {
            return Err(StoreError::UnknownNode(id));
        }

        let parent = dictionary.parent_of(&id).map(str::to_string);
        let removed = dictionary.subtree(&id);
        let dictionary = self.dictionary_mut()?;
        for node in &removed {
            dictionary.remove(node);
        }

        let cursor_removed = self
            .active_dictionary_id
            .as_ref()
            .is_some_and(|active| removed.contains(active));
        if cursor_removed {
            let root = self.dictionary()?.root_id().to_string();
            self.active_dictionary_id = Some(parent.unwrap_or(root));
        }
        Ok(id)
    }

    fn duplicate_data(&mut self, envelope: &Envelope) -> Result<String, StoreError> {
        let id = required_dictionary_id(envelope)?;
        let dictionary = self.dictionary()?;
        if !dictionary.contains(&id) {
            return Err(StoreError::UnknownNode(id));
        }

        let originals = dictionary.subtree(&id);
        let mut renamed = Vec::with_capacity(originals.len());
        for original in &originals {
            let schema_id = self
                .dictionary()?
                .get(original)
                .map(|node| node.schema_id.clone())
                .unwrap_or_default();
            renamed.push((original.clone(), self.next_node_id(&schema_id)?));
        }

        let dictionary = self.dictionary_mut()?;
        for (original, copy) in &renamed {
            let Some(mut node) = dictionary.get(original).cloned() else {
                continue;
            };
            if let Some(parent) = node.parent.as_mut() {
                if let Some((_, new_parent)) = renamed.iter().find(|(old, _)| *old == parent.id) {
                    parent.id = new_parent.clone();
                }
            }
            dictionary.insert(copy.clone(), node);
        }

        Ok(renamed
            .first()
            .map(|(_, copy)| copy.clone())
            .unwrap_or(id))
    }

    fn snapshot(
        &self,
        kind: MessageType,
        action: Option<String>,
        options: Option<MessageOptions>,
    ) -> Envelope {
        let mut envelope = Envelope::new(kind).with_options(options);
        envelope.action = action;
        envelope.data_dictionary = self.data_dictionary.clone();
        envelope.active_dictionary_id = self.active_dictionary_id.clone();
        envelope.active_navigation_config_id = self.active_navigation_config_id.clone();
        envelope
    }

    fn next_node_id(&mut self, base: &str) -> Result<String, StoreError> {
        let base = if base.is_empty() { "node" } else { base };
        loop {
            self.next_id += 1;
            let id = format!("{}-{}", base, self.next_id);
            if !self.dictionary()?.contains(&id) {
                return Ok(id);
            }
        }
    }

    fn dictionary(&self) -> Result<&DataDictionary, StoreError> {
        self.data_dictionary.as_ref().ok_or(StoreError::NotInitialized)
    }

    fn dictionary_mut(&mut self) -> Result<&mut DataDictionary, StoreError> {
        self.data_dictionary.as_mut().ok_or(StoreError::NotInitialized)
    }
}

fn required_dictionary_id(envelope: &Envelope) -> Result<String, StoreError> {
    envelope
        .dictionary_id
        .clone()
        .ok_or(StoreError::MissingField("dictionaryId"))
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/store.rs"]
mod tests;
