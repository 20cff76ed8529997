//! Merge policy - what a save does when the identifier already exists
//!
//! - `NoMerge`: the save fails with [`Error::Merge`]; nothing is written
//! - `Soft`: incoming values are added, stored values win on key collision
//! - `Override`: the incoming item replaces the stored one wholesale

use crate::metadata::{Metadata, MetadataValue};
use crate::record::{DbRecord, DbRelation};
use crate::value::Attributes;
use crate::{Error, ItemKind, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Merge behaviour of an adapter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeBehaviour {
    #[default]
    NoMerge,
    Soft,
    Override,
}

impl MergeBehaviour {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeBehaviour::NoMerge => "no_merge",
            MergeBehaviour::Soft => "soft",
            MergeBehaviour::Override => "override",
        }
    }

    pub fn all() -> &'static [MergeBehaviour] {
        &[MergeBehaviour::NoMerge, MergeBehaviour::Soft, MergeBehaviour::Override]
    }
}

impl FromStr for MergeBehaviour {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "no_merge" | "no-merge" | "nomerge" | "0" => Ok(MergeBehaviour::NoMerge),
            "soft" | "1" => Ok(MergeBehaviour::Soft),
            "override" | "2" => Ok(MergeBehaviour::Override),
            _ => Err(Error::InvalidOptions(format!(
                "unknown merge behaviour {:?}, expected one of no_merge, soft, override",
                s
            ))),
        }
    }
}

impl TryFrom<u8> for MergeBehaviour {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(MergeBehaviour::NoMerge),
            1 => Ok(MergeBehaviour::Soft),
            2 => Ok(MergeBehaviour::Override),
            other => Err(Error::InvalidOptions(format!("unknown merge behaviour code {}", other))),
        }
    }
}

impl std::fmt::Display for MergeBehaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve a record save against the stored record with the same identifier
pub fn merge_record(behaviour: MergeBehaviour, existing: DbRecord, incoming: DbRecord) -> Result<DbRecord> {
    match behaviour {
        MergeBehaviour::NoMerge => Err(Error::Merge {
            kind: ItemKind::Record,
            id: existing.identifier().to_string(),
        }),
        MergeBehaviour::Override => Ok(incoming),
        MergeBehaviour::Soft => {
            let id = existing.identifier().to_string();
            let attributes = soft_merge_attributes(&id, existing.attributes, incoming.attributes);
            let metadata = soft_merge_metadata(existing.metadata, incoming.metadata);
            DbRecord::normalized(attributes, metadata)
        }
    }
}

/// Resolve a relation save against the stored relation with the same
/// identifier. Under `Soft` the stored endpoints are kept.
pub fn merge_relation(
    behaviour: MergeBehaviour,
    existing: DbRelation,
    incoming: DbRelation,
) -> Result<DbRelation> {
    match behaviour {
        MergeBehaviour::NoMerge => Err(Error::Merge {
            kind: ItemKind::Relation,
            id: existing.identifier().to_string(),
        }),
        MergeBehaviour::Override => Ok(incoming),
        MergeBehaviour::Soft => {
            let id = existing.identifier().to_string();
            if existing.from_node != incoming.from_node || existing.to_node != incoming.to_node {
                tracing::warn!(
                    relation = %id,
                    "soft merge keeps stored endpoints {} -> {}, ignoring {} -> {}",
                    existing.from_node, existing.to_node, incoming.from_node, incoming.to_node
                );
            }
            let attributes = soft_merge_attributes(&id, existing.attributes, incoming.attributes);
            let metadata = soft_merge_metadata(existing.metadata, incoming.metadata);
            DbRelation::normalized(existing.from_node, existing.to_node, attributes, metadata)
        }
    }
}

/// Append incoming pairs whose key is not stored yet. Every occurrence of a
/// stored key is kept; incoming occurrences of that key are dropped.
fn soft_merge_attributes(id: &str, existing: Attributes, incoming: Attributes) -> Attributes {
    let mut merged = existing.clone();
    let mut discarded = 0usize;

    for (key, value) in incoming {
        if existing.contains_key(&key) {
            if !existing.contains(&key, &value) {
                discarded += 1;
            }
            continue;
        }
        merged.push(key, value);
    }

    if discarded > 0 {
        tracing::warn!(item = %id, discarded, "soft merge kept stored values for colliding attributes");
    }
    merged
}

/// Union metadata key by key. Stored values win, including empty reserved
/// text such as the `parent_id` of a top-level record. Maps are unioned entry
/// by entry.
fn soft_merge_metadata(existing: Metadata, incoming: Metadata) -> Metadata {
    let mut merged = existing;

    for (key, value) in incoming {
        let replacement = match (merged.get(&key), value) {
            (None, value) => Some(value),
            (Some(MetadataValue::Map(stored)), MetadataValue::Map(new_entries)) => {
                let mut union = stored.clone();
                for (k, v) in new_entries {
                    union.entry(k).or_insert(v);
                }
                Some(MetadataValue::Map(union))
            }
            _ => None,
        };
        if let Some(value) = replacement {
            merged.insert(key, value);
        }
    }

    merged
}
