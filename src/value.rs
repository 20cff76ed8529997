//! Attribute values - typed PROV attributes and their primitive encoding
//!
//! PROV attributes are an ordered list of `(qualified name, value)` pairs where
//! the same name may appear more than once. Values keep their native type:
//! - `String`, `Int`, `Float`, `Bool`
//! - `DateTime` (UTC)
//! - `QualifiedName` (`prefix:local`)
//! - `Literal` (PROV typed literal with datatype and optional language tag)
//!
//! Backends that can only store strings flatten attributes with [`encode`] and
//! rebuild them with [`decode`]; the [`TypeMap`] side channel records which
//! type tag each attribute had.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Attribute key -> type tag. Keys whose values are all strings are omitted.
pub type TypeMap = BTreeMap<String, String>;

/// Separates per-occurrence tags when a repeated key mixes value types
pub const TAG_SEPARATOR: &str = "|";

/// Type tags understood by [`decode`]
pub mod tags {
    pub const STRING: &str = "xsd:string";
    pub const INT: &str = "xsd:long";
    pub const FLOAT: &str = "xsd:double";
    pub const BOOL: &str = "xsd:boolean";
    pub const DATETIME: &str = "xsd:dateTime";
    pub const QUALIFIED_NAME: &str = "prov:QUALIFIED_NAME";
    pub const LITERAL: &str = "prov:Literal";
}

/// A PROV literal whose datatype is not one of the native value types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langtag: Option<String>,
}

impl Literal {
    pub fn new(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: datatype.into(),
            langtag: None,
        }
    }

    pub fn with_langtag(mut self, langtag: impl Into<String>) -> Self {
        self.langtag = Some(langtag.into());
        self
    }
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    QualifiedName(String),
    Literal(Literal),
}

impl AttributeValue {
    /// The tag recorded in the type map for this value
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => tags::STRING,
            AttributeValue::Int(_) => tags::INT,
            AttributeValue::Float(_) => tags::FLOAT,
            AttributeValue::Bool(_) => tags::BOOL,
            AttributeValue::DateTime(_) => tags::DATETIME,
            AttributeValue::QualifiedName(_) => tags::QUALIFIED_NAME,
            AttributeValue::Literal(_) => tags::LITERAL,
        }
    }

    /// Serialize to the string form stored by primitive-only backends
    pub fn to_primitive(&self) -> Result<String> {
        Ok(match self {
            AttributeValue::String(s) | AttributeValue::QualifiedName(s) => s.clone(),
            AttributeValue::Int(i) => i.to_string(),
            AttributeValue::Float(f) => f.to_string(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::DateTime(dt) => dt.to_rfc3339(),
            AttributeValue::Literal(lit) => serde_json::to_string(lit)?,
        })
    }

    /// Rebuild a value from its type tag and stored string
    pub fn from_primitive(tag: &str, raw: &str) -> Result<Self> {
        let invalid = |what: &str| Error::Database(format!("cannot decode {raw:?} as {what}"));

        match tag {
            tags::STRING => Ok(AttributeValue::String(raw.to_string())),
            tags::INT => raw.parse().map(AttributeValue::Int).map_err(|_| invalid(tag)),
            tags::FLOAT => raw.parse().map(AttributeValue::Float).map_err(|_| invalid(tag)),
            tags::BOOL => raw.parse().map(AttributeValue::Bool).map_err(|_| invalid(tag)),
            tags::DATETIME => DateTime::parse_from_rfc3339(raw)
                .map(|dt| AttributeValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| invalid(tag)),
            tags::QUALIFIED_NAME => Ok(AttributeValue::QualifiedName(raw.to_string())),
            tags::LITERAL => serde_json::from_str(raw)
                .map(AttributeValue::Literal)
                .map_err(|_| invalid(tag)),
            unknown => Err(Error::Database(format!("unrecognized type tag: {unknown}"))),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "\"{}\"", s),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::DateTime(dt) => write!(f, "\"{}\"^^xsd:dateTime", dt.to_rfc3339()),
            AttributeValue::QualifiedName(q) => write!(f, "'{}'", q),
            AttributeValue::Literal(lit) => match &lit.langtag {
                Some(lang) => write!(f, "\"{}\"@{}", lit.value, lang),
                None => write!(f, "\"{}\"^^{}", lit.value, lit.datatype),
            },
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(value)
    }
}

impl From<Literal> for AttributeValue {
    fn from(value: Literal) -> Self {
        AttributeValue::Literal(value)
    }
}

/// Ordered attribute pairs. Repeated keys are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Vec<(String, AttributeValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Every value stored under `key`, in insertion order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a AttributeValue> + 'a {
        self.0.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Whether any occurrence of `key` holds exactly `value`
    pub fn contains(&self, key: &str, value: &AttributeValue) -> bool {
        self.get_all(key).any(|v| v == value)
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = std::vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Flatten attributes into `(key, string)` pairs plus the type map needed to
/// restore them.
pub fn encode(attributes: &Attributes) -> Result<(Vec<(String, String)>, TypeMap)> {
    let mut flat = Vec::with_capacity(attributes.len());
    let mut key_tags: BTreeMap<&str, Vec<&'static str>> = BTreeMap::new();

    for (key, value) in attributes.iter() {
        flat.push((key.to_string(), value.to_primitive()?));
        key_tags.entry(key).or_default().push(value.type_tag());
    }

    let mut type_map = TypeMap::new();
    for (key, found) in key_tags {
        if found.iter().all(|t| *t == tags::STRING) {
            continue;
        }
        let entry = if found.iter().all(|t| *t == found[0]) {
            found[0].to_string()
        } else {
            found.join(TAG_SEPARATOR)
        };
        type_map.insert(key.to_string(), entry);
    }

    Ok((flat, type_map))
}

/// Rebuild typed attributes from flattened pairs and their type map.
///
/// Keys without a type map entry decode as strings. Unknown tags and values
/// that do not parse under their tag fail with [`Error::Database`].
pub fn decode(flat: &[(String, String)], type_map: &TypeMap) -> Result<Attributes> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for (key, _) in flat {
        *occurrences.entry(key.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut attributes = Attributes::new();

    for (key, raw) in flat {
        let index = seen.entry(key.as_str()).or_default();
        let position = *index;
        *index += 1;

        let tag = match type_map.get(key) {
            None => tags::STRING,
            Some(entry) if !entry.contains(TAG_SEPARATOR) => entry.as_str(),
            Some(entry) => {
                let per_occurrence: Vec<&str> = entry.split(TAG_SEPARATOR).collect();
                if per_occurrence.len() != occurrences[key.as_str()] {
                    return Err(Error::Database(format!(
                        "type map for {key} lists {} tags but the attribute occurs {} times",
                        per_occurrence.len(),
                        occurrences[key.as_str()]
                    )));
                }
                per_occurrence[position]
            }
        };

        attributes.push(key.clone(), AttributeValue::from_primitive(tag, raw)?);
    }

    Ok(attributes)
}
