//! Data dictionary (document tree) and schema dictionary.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type SchemaDictionary = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeParent {
    pub id: String,
    #[serde(default)]
    pub data_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub schema_id: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeParent>,
}

impl NodeRecord {
    pub fn new(schema_id: impl Into<String>, data: Value) -> Self {
        Self {
            schema_id: schema_id.into(),
            data,
            parent: None,
        }
    }

    pub fn with_parent(mut self, id: impl Into<String>, data_location: impl Into<String>) -> Self {
        self.parent = Some(NodeParent {
            id: id.into(),
            data_location: data_location.into(),
        });
        self
    }
}

#[derive(Serialize, Deserialize)]
struct DataDictionaryRepr(BTreeMap<String, NodeRecord>, String);

/// Node records keyed by dictionary id, plus the root id.
///
/// Serialized as `[entries, rootId]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DataDictionaryRepr", into = "DataDictionaryRepr")]
pub struct DataDictionary {
    entries: BTreeMap<String, NodeRecord>,
    root_id: String,
}

impl From<DataDictionaryRepr> for DataDictionary {
    fn from(repr: DataDictionaryRepr) -> Self {
        Self {
            entries: repr.0,
            root_id: repr.1,
        }
    }
}

impl From<DataDictionary> for DataDictionaryRepr {
    fn from(dictionary: DataDictionary) -> Self {
        DataDictionaryRepr(dictionary.entries, dictionary.root_id)
    }
}

impl DataDictionary {
    pub fn new(root_id: impl Into<String>, root: NodeRecord) -> Self {
        let root_id = root_id.into();
        let mut entries = BTreeMap::new();
        entries.insert(root_id.clone(), root);
        Self { entries, root_id }
    }

    pub fn with_node(mut self, id: impl Into<String>, node: NodeRecord) -> Self {
        self.entries.insert(id.into(), node);
        self
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn get(&self, id: &str) -> Option<&NodeRecord> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut NodeRecord> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, node: NodeRecord) -> Option<NodeRecord> {
        self.entries.insert(id.into(), node)
    }

    pub fn remove(&mut self, id: &str) -> Option<NodeRecord> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeRecord)> {
        self.entries.iter()
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.entries
            .get(id)
            .and_then(|node| node.parent.as_ref())
            .map(|parent| parent.id.as_str())
    }

    pub fn children_of(&self, id: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, node)| node.parent.as_ref().is_some_and(|p| p.id == id))
            .map(|(child, _)| child.as_str())
            .collect()
    }

    /// `id` followed by all of its descendants, breadth first.
    pub fn subtree(&self, id: &str) -> Vec<String> {
        if !self.contains(id) {
            return Vec::new();
        }

        let mut ids = vec![id.to_string()];
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        visited.insert(id);
        let mut cursor = 0;
        while cursor < ids.len() {
            let children: Vec<&str> = self
                .children_of(&ids[cursor])
                .into_iter()
                .filter(|child| visited.insert(*child))
                .collect();
            ids.extend(children.into_iter().map(str::to_string));
            cursor += 1;
        }
        ids
    }

    /// The first node whose parent link names a missing node or loops back
    /// on itself before reaching a node without a parent.
    pub fn broken_parent_link(&self) -> Option<&str> {
        self.entries.keys().map(String::as_str).find(|&id| {
            let mut seen: FxHashSet<&str> = FxHashSet::default();
            let mut current = id;
            loop {
                if !seen.insert(current) {
                    return true;
                }
                match self.parent_of(current) {
                    None => return false,
                    Some(parent) if !self.contains(parent) => return true,
                    Some(parent) => current = parent,
                }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// A path segment named an index or key that doesn't exist.
    Missing(String),
    /// A path segment went through a scalar value.
    NotContainer(String),
}

impl std::fmt::Display for LocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationError::Missing(location) => write!(f, "data location not found: {}", location),
            LocationError::NotContainer(location) => {
                write!(f, "data location is not an object or array: {}", location)
            }
        }
    }
}

impl std::error::Error for LocationError {}

/// Reads the value at a dot-separated location (`children.0.text`).
pub fn value_at<'a>(root: &'a Value, location: &str) -> Option<&'a Value> {
    if location.is_empty() {
        return Some(root);
    }
    location.split('.').try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Writes `value` at a dot-separated location. Missing object keys are
/// created; array indices must exist, or equal the length to append.
pub fn set_value_at(root: &mut Value, location: &str, value: Value) -> Result<(), LocationError> {
    if location.is_empty() {
        *root = value;
        return Ok(());
    }

    let segments: Vec<&str> = location.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| LocationError::Missing(location.to_string()))?;

    let mut current = root;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .map_err(|_| LocationError::Missing(location.to_string()))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| LocationError::Missing(location.to_string()))?
            }
            _ => return Err(LocationError::NotContainer(location.to_string())),
        };
    }

    if current.is_null() {
        *current = Value::Object(serde_json::Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = last
                .parse::<usize>()
                .map_err(|_| LocationError::Missing(location.to_string()))?;
            if index < items.len() {
                items[index] = value;
                Ok(())
            } else if index == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(LocationError::Missing(location.to_string()))
            }
        }
        _ => Err(LocationError::NotContainer(location.to_string())),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/dictionary.rs"]
mod tests;
