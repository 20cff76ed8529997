//! Metadata schema - the reserved keys every stored item carries
//!
//! Every record and relation has these keys, even when the value is empty:
//! - `prov_type`: the PROV type qualifier (`prov:Entity`, `prov:Association`, ...)
//! - `identifier`: the qualified name of the node or relation
//! - `namespaces`: prefix -> URI bindings for the qualified names
//! - `type_map`: attribute key -> type tag, see [`crate::value::encode`]
//! - `parent_id`: the enclosing bundle, empty at document level
//!
//! Backends may add their own keys; generic callers ignore them.

use crate::value::TypeMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const METADATA_KEY_PROV_TYPE: &str = "prov_type";
pub const METADATA_KEY_IDENTIFIER: &str = "identifier";
pub const METADATA_KEY_NAMESPACES: &str = "namespaces";
pub const METADATA_KEY_TYPE_MAP: &str = "type_map";
pub const METADATA_PARENT_ID: &str = "parent_id";

/// All reserved keys, in a stable order
pub const RESERVED_KEYS: [&str; 5] = [
    METADATA_KEY_PROV_TYPE,
    METADATA_KEY_IDENTIFIER,
    METADATA_KEY_NAMESPACES,
    METADATA_KEY_TYPE_MAP,
    METADATA_PARENT_ID,
];

/// `prov_type` of a record that stands for a bundle
pub const PROV_TYPE_BUNDLE: &str = "prov:Bundle";

/// A metadata value: plain text or a string map (`namespaces`, `type_map`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Map(BTreeMap<String, String>),
}

impl MetadataValue {
    pub fn is_empty(&self) -> bool {
        match self {
            MetadataValue::Text(s) => s.is_empty(),
            MetadataValue::Map(m) => m.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            MetadataValue::Map(m) => Some(m),
            MetadataValue::Text(_) => None,
        }
    }

    /// Default (empty) value for a reserved key
    fn empty_for(key: &str) -> Self {
        match key {
            METADATA_KEY_NAMESPACES | METADATA_KEY_TYPE_MAP => MetadataValue::Map(BTreeMap::new()),
            _ => MetadataValue::Text(String::new()),
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Text(s) => write!(f, "{}", s),
            MetadataValue::Map(m) => {
                let entries: Vec<String> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<BTreeMap<String, String>> for MetadataValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        MetadataValue::Map(value)
    }
}

/// Metadata mapping of a record or relation.
///
/// Unlike attributes, keys are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Default for Metadata {
    fn default() -> Self {
        let mut metadata = Self(BTreeMap::new());
        metadata.ensure_reserved();
        metadata
    }
}

impl Metadata {
    /// Metadata with every reserved key present, `prov_type` and `identifier` set
    pub fn new(prov_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        let mut metadata = Self::default();
        metadata.insert(METADATA_KEY_PROV_TYPE, MetadataValue::Text(prov_type.into()));
        metadata.insert(METADATA_KEY_IDENTIFIER, MetadataValue::Text(identifier.into()));
        metadata
    }

    /// Bind a namespace prefix
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        if let Some(MetadataValue::Map(namespaces)) = self.0.get_mut(METADATA_KEY_NAMESPACES) {
            namespaces.insert(prefix.into(), uri.into());
        } else {
            let mut namespaces: BTreeMap<String, String> = BTreeMap::new();
            namespaces.insert(prefix.into(), uri.into());
            self.insert(METADATA_KEY_NAMESPACES, namespaces);
        }
        self
    }

    /// Place the item inside a bundle
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.insert(METADATA_PARENT_ID, MetadataValue::Text(parent_id.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn text(&self, key: &str) -> &str {
        self.0.get(key).and_then(MetadataValue::as_text).unwrap_or("")
    }

    pub fn prov_type(&self) -> &str {
        self.text(METADATA_KEY_PROV_TYPE)
    }

    pub fn identifier(&self) -> &str {
        self.text(METADATA_KEY_IDENTIFIER)
    }

    pub fn parent_id(&self) -> &str {
        self.text(METADATA_PARENT_ID)
    }

    pub fn namespaces(&self) -> BTreeMap<String, String> {
        self.0
            .get(METADATA_KEY_NAMESPACES)
            .and_then(MetadataValue::as_map)
            .cloned()
            .unwrap_or_default()
    }

    pub fn type_map(&self) -> TypeMap {
        self.0
            .get(METADATA_KEY_TYPE_MAP)
            .and_then(MetadataValue::as_map)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.insert(METADATA_KEY_IDENTIFIER, MetadataValue::Text(identifier.into()));
    }

    pub fn set_type_map(&mut self, type_map: TypeMap) {
        self.insert(METADATA_KEY_TYPE_MAP, type_map);
    }

    /// Add any missing reserved key with an empty value
    pub fn ensure_reserved(&mut self) {
        for key in RESERVED_KEYS {
            self.0
                .entry(key.to_string())
                .or_insert_with(|| MetadataValue::empty_for(key));
        }
    }

    pub fn has_reserved_keys(&self) -> bool {
        RESERVED_KEYS.iter().all(|key| self.0.contains_key(*key))
    }
}

impl FromIterator<(String, MetadataValue)> for Metadata {
    /// Collects the entries as given; call [`Metadata::ensure_reserved`] to
    /// complete them.
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Metadata {
    type Item = (String, MetadataValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, MetadataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
