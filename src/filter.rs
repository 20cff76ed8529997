//! Filter engine - exact-match predicates over attributes and metadata
//!
//! A filter is conjunctive: every property pair must occur in the candidate's
//! attributes and every metadata entry must equal the candidate's entry.
//! Comparison happens on decoded native values. An empty filter matches
//! everything.

use crate::metadata::{Metadata, MetadataValue};
use crate::record::{DbRecord, DbRelation};
use crate::value::{AttributeValue, Attributes};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub properties: Attributes,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Filter {
    /// The filter that matches every item
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.properties.push(key, value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.metadata.is_empty()
    }

    pub fn matches(&self, attributes: &Attributes, metadata: &Metadata) -> bool {
        self.properties.iter().all(|(key, value)| attributes.contains(key, value))
            && self
                .metadata
                .iter()
                .all(|(key, value)| metadata.get(key) == Some(value))
    }

    pub fn matches_record(&self, record: &DbRecord) -> bool {
        self.matches(&record.attributes, &record.metadata)
    }

    pub fn matches_relation(&self, relation: &DbRelation) -> bool {
        self.matches(&relation.attributes, &relation.metadata)
    }

    /// Metadata text the filter pins for `key`, if any. Backends use this to
    /// narrow their scan before matching.
    pub fn metadata_text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_text)
    }

    /// Parse a `key=value` property term.
    ///
    /// The value is a string unless it carries a type tag suffix, as in
    /// `ex:count=3^^xsd:long` or `ex:done=true^^xsd:boolean`.
    pub fn parse_property(term: &str) -> Result<(String, AttributeValue)> {
        let (key, raw) = split_term(term)?;
        let value = match raw.rsplit_once("^^") {
            Some((raw, tag)) => AttributeValue::from_primitive(tag, raw)
                .map_err(|e| Error::InvalidOptions(format!("bad filter term {:?}: {}", term, e)))?,
            None => AttributeValue::String(raw.to_string()),
        };
        Ok((key.to_string(), value))
    }

    /// Parse a `key=value` metadata term (text values only)
    pub fn parse_metadata(term: &str) -> Result<(String, MetadataValue)> {
        let (key, raw) = split_term(term)?;
        Ok((key.to_string(), MetadataValue::Text(raw.to_string())))
    }
}

fn split_term(term: &str) -> Result<(&str, &str)> {
    match term.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(Error::InvalidOptions(format!("filter term must look like key=value, got {:?}", term))),
    }
}
