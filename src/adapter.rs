//! Adapter contract
//!
//! Every storage backend implements [`ProvAdapter`]. The connection lifecycle
//! is `Disconnected -> connect -> Connected -> disconnect -> Disconnected`;
//! every data operation issued while disconnected fails with
//! [`Error::Auth`]. There is no implicit reconnect.
//!
//! Adapters are single-caller objects: mutating operations take `&mut self`.
//! Share one across threads only behind external synchronization.

use std::collections::BTreeMap;
use crate::filter::Filter;
use crate::merge::MergeBehaviour;
use crate::metadata::{Metadata, METADATA_PARENT_ID};
use crate::record::{DbBundle, DbDocument, DbRecord, DbRelation};
use crate::tail::{self, Tail};
use crate::value::Attributes;
use crate::{Error, ItemKind, Result};

/// Opaque, backend-defined credential and connection fields
pub type AuthInfo = BTreeMap<String, String>;

/// Trait for PROV storage backends
///
/// Backends are responsible for:
/// 1. Keeping every reserved metadata key on stored items
/// 2. Resolving identifier collisions with the configured [`MergeBehaviour`]
/// 3. Making each save observably atomic
/// 4. Surfacing missing identifiers as [`Error::NotFound`]
pub trait ProvAdapter: Send {
    /// Backend name (for logs and display)
    fn name(&self) -> &str;

    /// Establish the connection. Fails with [`Error::Auth`] when credentials
    /// are rejected and [`Error::InvalidOptions`] when `auth` is malformed.
    fn connect(&mut self, auth: &AuthInfo) -> Result<()>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn merge_behaviour(&self) -> MergeBehaviour;

    /// Change the merge behaviour; applies to every later save
    fn set_merge_behaviour(&mut self, behaviour: MergeBehaviour);

    /// Store a record and return its identifier
    fn save_record(&mut self, attributes: Attributes, metadata: Metadata) -> Result<String>;

    /// Store a relation between two existing records and return its identifier
    fn save_relation(
        &mut self,
        from_node: &str,
        to_node: &str,
        attributes: Attributes,
        metadata: Metadata,
    ) -> Result<String>;

    fn get_record(&self, record_id: &str) -> Result<DbRecord>;

    /// Fetch a relation. Fails with [`Error::NotFound`] if either endpoint
    /// record no longer exists.
    fn get_relation(&self, relation_id: &str) -> Result<DbRelation>;

    fn get_records_by_filter(&self, filter: &Filter) -> Result<Vec<DbRecord>>;

    fn get_relations_by_filter(&self, filter: &Filter) -> Result<Vec<DbRelation>>;

    /// Every relation with an endpoint in `record_ids`, each returned once
    fn get_relations_for_records(&self, record_ids: &[String]) -> Result<Vec<DbRelation>>;

    /// Delete every record matching `filter`; returns how many were removed.
    /// Relations are left untouched.
    fn delete_records_by_filter(&mut self, filter: &Filter) -> Result<usize>;

    fn delete_record(&mut self, record_id: &str) -> Result<()>;

    fn delete_relation(&mut self, relation_id: &str) -> Result<()>;

    /// Sub-graph reachable from the records matching `filter`
    fn get_records_tail(&self, filter: &Filter, depth: Option<usize>) -> Result<Tail> {
        tail::traverse(self, filter, depth)
    }

    /// A bundle's own record plus every record and relation placed inside it
    fn get_bundle(&self, bundle_id: &str) -> Result<DbBundle> {
        let bundle_record = self.get_record(bundle_id)?;
        let members = Filter::all().with_metadata(METADATA_PARENT_ID, bundle_id);

        Ok(DbBundle {
            records: self.get_records_by_filter(&members)?,
            relations: self.get_relations_by_filter(&members)?,
            bundle_record: Some(bundle_record),
        })
    }

    /// Everything stored, grouped into document and bundles
    fn get_document(&self) -> Result<DbDocument> {
        let records = self.get_records_by_filter(&Filter::all())?;
        let relations = self.get_relations_by_filter(&Filter::all())?;
        Ok(DbDocument::assemble(records, relations))
    }
}

/// Fail with [`Error::Auth`] unless the adapter is connected
pub fn require_connected(connected: bool, backend: &str, operation: &str) -> Result<()> {
    if connected {
        Ok(())
    } else {
        Err(not_connected(backend, operation))
    }
}

pub(crate) fn not_connected(backend: &str, operation: &str) -> Error {
    Error::Auth(format!("{} called on {} adapter before connect", operation, backend))
}

/// Counts reported by [`save_document`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub records: usize,
    pub relations: usize,
}

/// Save a whole document: records first (bundle records before their
/// members), relations last so their endpoints already exist.
///
/// Stops at the first failure; items saved before it stay saved.
pub fn save_document(adapter: &mut dyn ProvAdapter, document: &DbDocument) -> Result<SaveSummary> {
    let mut summary = SaveSummary::default();

    let bundles = std::iter::once(&document.document).chain(document.bundles.values());
    let mut relations = Vec::new();

    for bundle in bundles {
        for record in bundle.bundle_record.iter().chain(bundle.records.iter()) {
            adapter.save_record(record.attributes.clone(), record.metadata.clone())?;
            summary.records += 1;
        }
        relations.extend(bundle.relations.iter());
    }

    for relation in relations {
        adapter.save_relation(
            &relation.from_node,
            &relation.to_node,
            relation.attributes.clone(),
            relation.metadata.clone(),
        )?;
        summary.relations += 1;
    }

    tracing::info!(
        backend = adapter.name(),
        records = summary.records,
        relations = summary.relations,
        "saved document"
    );
    Ok(summary)
}

/// Both endpoints of a relation must exist; the first missing one is reported
pub(crate) fn check_endpoints(
    relation: &DbRelation,
    exists: impl Fn(&str) -> Result<bool>,
) -> Result<()> {
    for endpoint in [&relation.from_node, &relation.to_node] {
        if !exists(endpoint.as_str())? {
            return Err(Error::not_found(ItemKind::Record, endpoint.as_str()));
        }
    }
    Ok(())
}
