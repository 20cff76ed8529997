//! In-memory backend
//!
//! Keeps records and relations in ordered maps, plus an index from record
//! identifier to incident relations (both directions). Values are stored in
//! native form, so no type-map decoding happens on read.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use crate::adapter::{check_endpoints, require_connected, AuthInfo, ProvAdapter};
use crate::filter::Filter;
use crate::merge::{self, MergeBehaviour};
use crate::metadata::Metadata;
use crate::record::{DbRecord, DbRelation};
use crate::value::Attributes;
use crate::{Error, ItemKind, Result};

pub const AUTH_KEY_USER_NAME: &str = "user_name";
pub const AUTH_KEY_USER_PASSWORD: &str = "user_password";

/// Process-local adapter. Contents live as long as the adapter and survive
/// disconnect/connect cycles.
#[derive(Debug, Default)]
pub struct InMemoryAdapter {
    /// Records indexed by identifier
    records: BTreeMap<String, DbRecord>,
    /// Relations indexed by identifier
    relations: BTreeMap<String, DbRelation>,
    /// Record identifier -> identifiers of relations touching it
    relations_by_node: HashMap<String, BTreeSet<String>>,
    /// Expected `(user_name, user_password)`, if credentials are enforced
    credentials: Option<(String, String)>,
    connected: bool,
    merge_behaviour: MergeBehaviour,
}

impl InMemoryAdapter {
    /// Adapter that accepts any auth info
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that only connects with matching `user_name` / `user_password`
    pub fn with_credentials(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some((user_name.into(), password.into())),
            ..Self::default()
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    fn ensure_connected(&self, operation: &str) -> Result<()> {
        require_connected(self.connected, self.name(), operation)
    }

    fn index_relation(&mut self, relation: &DbRelation) {
        for endpoint in [&relation.from_node, &relation.to_node] {
            self.relations_by_node
                .entry(endpoint.clone())
                .or_default()
                .insert(relation.identifier().to_string());
        }
    }

    fn unindex_relation(&mut self, relation: &DbRelation) {
        for endpoint in [&relation.from_node, &relation.to_node] {
            if let Some(ids) = self.relations_by_node.get_mut(endpoint) {
                ids.remove(relation.identifier());
                if ids.is_empty() {
                    self.relations_by_node.remove(endpoint);
                }
            }
        }
    }
}

impl ProvAdapter for InMemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&mut self, auth: &AuthInfo) -> Result<()> {
        if let Some((user, password)) = &self.credentials {
            let given_user = auth.get(AUTH_KEY_USER_NAME);
            let given_password = auth.get(AUTH_KEY_USER_PASSWORD);
            if given_user.is_none() || given_password.is_none() {
                return Err(Error::InvalidOptions(format!(
                    "memory adapter requires {} and {}",
                    AUTH_KEY_USER_NAME, AUTH_KEY_USER_PASSWORD
                )));
            }
            if given_user != Some(user) || given_password != Some(password) {
                return Err(Error::Auth("invalid user name or password".to_string()));
            }
        }

        self.connected = true;
        tracing::info!(records = self.records.len(), "connected memory backend");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        tracing::info!("disconnected memory backend");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn merge_behaviour(&self) -> MergeBehaviour {
        self.merge_behaviour
    }

    fn set_merge_behaviour(&mut self, behaviour: MergeBehaviour) {
        self.merge_behaviour = behaviour;
    }

    fn save_record(&mut self, attributes: Attributes, metadata: Metadata) -> Result<String> {
        self.ensure_connected("save_record")?;

        let incoming = DbRecord::normalized(attributes, metadata)?;
        let id = incoming.identifier().to_string();
        if id.is_empty() {
            return Err(Error::CreateRecord {
                id,
                reason: "metadata has no identifier".to_string(),
            });
        }

        let record = match self.records.get(&id) {
            Some(existing) => merge::merge_record(self.merge_behaviour, existing.clone(), incoming)?,
            None => incoming,
        };

        tracing::debug!(record = %id, merge = %self.merge_behaviour, "saving record");
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    fn save_relation(
        &mut self,
        from_node: &str,
        to_node: &str,
        attributes: Attributes,
        metadata: Metadata,
    ) -> Result<String> {
        self.ensure_connected("save_relation")?;

        let incoming = DbRelation::normalized(from_node, to_node, attributes, metadata)?;
        check_endpoints(&incoming, |id| Ok(self.records.contains_key(id)))?;
        let id = incoming.identifier().to_string();

        let relation = match self.relations.get(&id) {
            Some(existing) => merge::merge_relation(self.merge_behaviour, existing.clone(), incoming)?,
            None => incoming,
        };

        tracing::debug!(relation = %id, from = from_node, to = to_node, "saving relation");
        if let Some(previous) = self.relations.remove(&id) {
            self.unindex_relation(&previous);
        }
        self.index_relation(&relation);
        self.relations.insert(id.clone(), relation);
        Ok(id)
    }

    fn get_record(&self, record_id: &str) -> Result<DbRecord> {
        self.ensure_connected("get_record")?;
        self.records
            .get(record_id)
            .cloned()
            .ok_or_else(|| Error::not_found(ItemKind::Record, record_id))
    }

    fn get_relation(&self, relation_id: &str) -> Result<DbRelation> {
        self.ensure_connected("get_relation")?;
        let relation = self
            .relations
            .get(relation_id)
            .ok_or_else(|| Error::not_found(ItemKind::Relation, relation_id))?;
        check_endpoints(relation, |id| Ok(self.records.contains_key(id)))?;
        Ok(relation.clone())
    }

    fn get_records_by_filter(&self, filter: &Filter) -> Result<Vec<DbRecord>> {
        self.ensure_connected("get_records_by_filter")?;
        Ok(self
            .records
            .values()
            .filter(|r| filter.matches_record(r))
            .cloned()
            .collect())
    }

    fn get_relations_by_filter(&self, filter: &Filter) -> Result<Vec<DbRelation>> {
        self.ensure_connected("get_relations_by_filter")?;
        Ok(self
            .relations
            .values()
            .filter(|r| filter.matches_relation(r))
            .cloned()
            .collect())
    }

    fn get_relations_for_records(&self, record_ids: &[String]) -> Result<Vec<DbRelation>> {
        self.ensure_connected("get_relations_for_records")?;

        let ids: BTreeSet<&String> = record_ids
            .iter()
            .filter_map(|id| self.relations_by_node.get(id))
            .flatten()
            .collect();

        Ok(ids
            .into_iter()
            .filter_map(|id| self.relations.get(id))
            .cloned()
            .collect())
    }

    fn delete_records_by_filter(&mut self, filter: &Filter) -> Result<usize> {
        self.ensure_connected("delete_records_by_filter")?;

        let before = self.records.len();
        self.records.retain(|_, record| !filter.matches_record(record));
        let deleted = before - self.records.len();

        tracing::debug!(deleted, "deleted records by filter");
        Ok(deleted)
    }

    fn delete_record(&mut self, record_id: &str) -> Result<()> {
        self.ensure_connected("delete_record")?;
        if self.records.remove(record_id).is_none() {
            return Err(Error::not_found(ItemKind::Record, record_id));
        }
        tracing::debug!(record = record_id, "deleted record");
        Ok(())
    }

    fn delete_relation(&mut self, relation_id: &str) -> Result<()> {
        self.ensure_connected("delete_relation")?;
        let relation = self
            .relations
            .remove(relation_id)
            .ok_or_else(|| Error::not_found(ItemKind::Relation, relation_id))?;
        self.unindex_relation(&relation);
        tracing::debug!(relation = relation_id, "deleted relation");
        Ok(())
    }
}
