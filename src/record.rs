//! Record and relation types - the storage-facing shapes
//!
//! - [`DbRecord`]: a provenance node (entity, activity, agent, bundle)
//! - [`DbRelation`]: a directed, typed edge between two records
//! - [`DbBundle`] / [`DbDocument`]: the aggregates handed back to callers that
//!   rebuild PROV documents

use crate::metadata::{Metadata, PROV_TYPE_BUNDLE};
use crate::value::{self, Attributes};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of identifiers generated for anonymous relations
pub const ANONYMOUS_RELATION_PREFIX: &str = "_:rel-";

/// A stored provenance node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbRecord {
    pub attributes: Attributes,
    pub metadata: Metadata,
}

impl DbRecord {
    pub fn new(attributes: Attributes, metadata: Metadata) -> Self {
        Self { attributes, metadata }
    }

    /// Build a record in its stored form: every reserved key present and the
    /// type map recomputed from the attributes.
    pub fn normalized(attributes: Attributes, metadata: Metadata) -> Result<Self> {
        let metadata = normalize_metadata(&attributes, metadata)?;
        Ok(Self { attributes, metadata })
    }

    pub fn identifier(&self) -> &str {
        self.metadata.identifier()
    }

    pub fn is_bundle(&self) -> bool {
        self.metadata.prov_type() == PROV_TYPE_BUNDLE
    }
}

/// A stored relation between two records.
///
/// The endpoints are kept next to the attributes, never inside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbRelation {
    pub from_node: String,
    pub to_node: String,
    pub attributes: Attributes,
    pub metadata: Metadata,
}

impl DbRelation {
    pub fn new(
        from_node: impl Into<String>,
        to_node: impl Into<String>,
        attributes: Attributes,
        metadata: Metadata,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            to_node: to_node.into(),
            attributes,
            metadata,
        }
    }

    /// Build a relation in its stored form. An empty identifier is replaced by
    /// a deterministic one, see [`anonymous_relation_id`].
    pub fn normalized(
        from_node: impl Into<String>,
        to_node: impl Into<String>,
        attributes: Attributes,
        metadata: Metadata,
    ) -> Result<Self> {
        let from_node = from_node.into();
        let to_node = to_node.into();
        let mut metadata = normalize_metadata(&attributes, metadata)?;

        if metadata.identifier().is_empty() {
            let id = anonymous_relation_id(&from_node, &to_node, metadata.prov_type(), metadata.parent_id());
            metadata.set_identifier(id);
        }

        Ok(Self { from_node, to_node, attributes, metadata })
    }

    pub fn identifier(&self) -> &str {
        self.metadata.identifier()
    }

    /// Whether `id` is one of the two endpoints
    pub fn touches(&self, id: &str) -> bool {
        self.from_node == id || self.to_node == id
    }
}

fn normalize_metadata(attributes: &Attributes, mut metadata: Metadata) -> Result<Metadata> {
    metadata.ensure_reserved();
    let (_, type_map) = value::encode(attributes)?;
    metadata.set_type_map(type_map);
    Ok(metadata)
}

/// Deterministic identifier for a relation saved without one.
///
/// Hashes the endpoints, the PROV type and the enclosing bundle. Attributes
/// stay out of the hash so that re-saving the relation with more attributes
/// lands on the same identifier and goes through the merge policy.
pub fn anonymous_relation_id(from_node: &str, to_node: &str, prov_type: &str, parent_id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [from_node, to_node, prov_type, parent_id] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }

    let hex = hasher.finalize().to_hex();
    format!("{}{}", ANONYMOUS_RELATION_PREFIX, &hex.as_str()[..16])
}

/// Records and relations of one bundle (or of the top-level document)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbBundle {
    pub records: Vec<DbRecord>,
    #[serde(default)]
    pub relations: Vec<DbRelation>,
    /// The record describing the bundle itself; `None` for the document
    #[serde(default)]
    pub bundle_record: Option<DbRecord>,
}

/// A whole stored document: top-level bundle plus named bundles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbDocument {
    pub document: DbBundle,
    #[serde(default)]
    pub bundles: BTreeMap<String, DbBundle>,
}

impl DbDocument {
    /// Group flat records and relations by their `parent_id`.
    ///
    /// Records typed `prov:Bundle` become the `bundle_record` of the bundle
    /// they name. Items whose parent bundle has no stored bundle record still
    /// get a bundle entry, with `bundle_record` left empty.
    pub fn assemble(records: Vec<DbRecord>, relations: Vec<DbRelation>) -> Self {
        let mut document = DbDocument::default();

        for record in records {
            if record.is_bundle() {
                let id = record.identifier().to_string();
                document.bundles.entry(id).or_default().bundle_record = Some(record);
                continue;
            }
            match record.metadata.parent_id() {
                "" => document.document.records.push(record),
                parent => {
                    let parent = parent.to_string();
                    document.bundles.entry(parent).or_default().records.push(record);
                }
            }
        }

        for relation in relations {
            match relation.metadata.parent_id() {
                "" => document.document.relations.push(relation),
                parent => {
                    let parent = parent.to_string();
                    document.bundles.entry(parent).or_default().relations.push(relation);
                }
            }
        }

        document
    }

    pub fn record_count(&self) -> usize {
        self.document.records.len()
            + self
                .bundles
                .values()
                .map(|b| b.records.len() + usize::from(b.bundle_record.is_some()))
                .sum::<usize>()
    }

    pub fn relation_count(&self) -> usize {
        self.document.relations.len() + self.bundles.values().map(|b| b.relations.len()).sum::<usize>()
    }
}
