//! Message envelopes exchanged between the UI side and the worker.
//!
//! Every envelope carries a `type`; the `action` verb is kept as a string so
//! that unknown verbs survive decoding and can be ignored by handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::dictionary::{DataDictionary, SchemaDictionary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Initialize,
    Data,
    Navigation,
    Custom,
    Error,
}

impl MessageType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initialize" => Some(Self::Initialize),
            "data" => Some(Self::Data),
            "navigation" => Some(Self::Navigation),
            "custom" => Some(Self::Custom),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Data => "data",
            Self::Navigation => "navigation",
            Self::Custom => "custom",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataAction {
    Update,
    Add,
    Remove,
    Duplicate,
}

impl DataAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "update" => Some(Self::Update),
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "duplicate" => Some(Self::Duplicate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationAction {
    Update,
    Get,
}

impl NavigationAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "update" => Some(Self::Update),
            "get" => Some(Self::Get),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Get => "get",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOptions {
    pub originator_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageOptions {
    pub fn from_originator(originator_id: impl Into<String>) -> Self {
        Self {
            originator_id: originator_id.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_dictionary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_navigation_config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dictionary: Option<DataDictionary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_dictionary: Option<SchemaDictionary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<MessageOptions>,
    /// Type-specific fields without a dedicated slot (e.g. `shortcuts`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            action: None,
            id: None,
            dictionary_id: None,
            data_location: None,
            data: None,
            active_dictionary_id: None,
            active_navigation_config_id: None,
            data_dictionary: None,
            schema_dictionary: None,
            options: None,
            extra: Map::new(),
        }
    }

    pub fn initialize(data_dictionary: DataDictionary, schema_dictionary: SchemaDictionary) -> Self {
        let mut envelope = Self::new(MessageType::Initialize);
        envelope.data_dictionary = Some(data_dictionary);
        envelope.schema_dictionary = Some(schema_dictionary);
        envelope
    }

    pub fn data(action: DataAction, dictionary_id: impl Into<String>) -> Self {
        Self::new(MessageType::Data)
            .with_action(action.as_str())
            .with_dictionary_id(dictionary_id)
    }

    pub fn data_update(dictionary_id: impl Into<String>, data: Value) -> Self {
        Self::data(DataAction::Update, dictionary_id).with_data(data)
    }

    pub fn navigation_update(
        active_dictionary_id: impl Into<String>,
        active_navigation_config_id: Option<String>,
    ) -> Self {
        let mut envelope =
            Self::new(MessageType::Navigation).with_action(NavigationAction::Update.as_str());
        envelope.active_dictionary_id = Some(active_dictionary_id.into());
        envelope.active_navigation_config_id = active_navigation_config_id;
        envelope
    }

    pub fn custom(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(MessageType::Custom)
            .with_action(action)
            .with_id(id)
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_dictionary_id(mut self, dictionary_id: impl Into<String>) -> Self {
        self.dictionary_id = Some(dictionary_id.into());
        self
    }

    pub fn with_data_location(mut self, location: impl Into<String>) -> Self {
        self.data_location = Some(location.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_originator(mut self, originator_id: impl Into<String>) -> Self {
        self.options = Some(MessageOptions::from_originator(originator_id));
        self
    }

    pub fn with_options(mut self, options: Option<MessageOptions>) -> Self {
        self.options = options;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn data_action(&self) -> Option<DataAction> {
        match self.kind {
            MessageType::Data => self.action.as_deref().and_then(DataAction::parse),
            _ => None,
        }
    }

    pub fn navigation_action(&self) -> Option<NavigationAction> {
        match self.kind {
            MessageType::Navigation => self.action.as_deref().and_then(NavigationAction::parse),
            _ => None,
        }
    }

    pub fn originator_id(&self) -> Option<&str> {
        self.options.as_ref().map(|o| o.originator_id.as_str())
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validates the `type` tag before decoding the remaining fields.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(map) = &value else {
            return Err(ProtocolError::NotAnObject);
        };
        match map.get("type") {
            None | Some(Value::Null) => return Err(ProtocolError::MissingType),
            Some(Value::String(kind)) => {
                if MessageType::parse(kind).is_none() {
                    return Err(ProtocolError::UnknownType(kind.clone()));
                }
            }
            Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Invalid(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    NotAnObject,
    MissingType,
    UnknownType(String),
    InvalidJson(String),
    Invalid(String),
    Encode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::NotAnObject => write!(f, "envelope is not a JSON object"),
            ProtocolError::MissingType => write!(f, "envelope has no type"),
            ProtocolError::UnknownType(kind) => write!(f, "unknown envelope type: {}", kind),
            ProtocolError::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            ProtocolError::Invalid(e) => write!(f, "invalid envelope: {}", e),
            ProtocolError::Encode(e) => write!(f, "failed to encode envelope: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
#[path = "../../tests/unit/kernel/message.rs"]
mod tests;
