//! Tail traversal - the sub-graph reachable from a filtered seed set
//!
//! Breadth-first and level-synchronous: each round collects every relation
//! incident on the current frontier and resolves the far endpoints. Records
//! and relations are tracked by identifier before they are enqueued, so every
//! item is visited at most once and the walk terminates on cyclic graphs even
//! without a depth limit.

use std::collections::HashSet;
use crate::adapter::ProvAdapter;
use crate::filter::Filter;
use crate::record::{DbBundle, DbRecord, DbRelation};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Records and relations collected by a traversal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tail {
    pub records: Vec<DbRecord>,
    pub relations: Vec<DbRelation>,
}

impl Tail {
    /// Reassemble the result as a bundle
    pub fn into_bundle(self, bundle_record: Option<DbRecord>) -> DbBundle {
        DbBundle {
            records: self.records,
            relations: self.relations,
            bundle_record,
        }
    }

    pub fn record_ids(&self) -> HashSet<&str> {
        self.records.iter().map(DbRecord::identifier).collect()
    }

    pub fn relation_ids(&self) -> HashSet<&str> {
        self.relations.iter().map(DbRelation::identifier).collect()
    }
}

/// Walk outward from the records matching `filter`, following relations in
/// both directions for at most `depth` hops (`None` = until exhausted).
///
/// An endpoint that cannot be resolved fails the traversal with
/// [`crate::Error::NotFound`].
pub fn traverse<A: ProvAdapter + ?Sized>(adapter: &A, filter: &Filter, depth: Option<usize>) -> Result<Tail> {
    let seeds = adapter.get_records_by_filter(filter)?;

    let mut visited_records: HashSet<String> =
        seeds.iter().map(|r| r.identifier().to_string()).collect();
    let mut visited_relations: HashSet<String> = HashSet::new();
    let mut frontier: Vec<String> = seeds.iter().map(|r| r.identifier().to_string()).collect();
    let mut tail = Tail { records: seeds, relations: Vec::new() };
    let mut rounds = 0usize;

    while !frontier.is_empty() && depth.is_none_or(|max| rounds < max) {
        rounds += 1;
        let mut next_frontier = Vec::new();

        for relation in adapter.get_relations_for_records(&frontier)? {
            if !visited_relations.insert(relation.identifier().to_string()) {
                continue;
            }

            for endpoint in [&relation.from_node, &relation.to_node] {
                if visited_records.contains(endpoint.as_str()) {
                    continue;
                }
                let record = adapter.get_record(endpoint)?;
                visited_records.insert(endpoint.clone());
                next_frontier.push(endpoint.clone());
                tail.records.push(record);
            }

            tail.relations.push(relation);
        }

        tracing::debug!(
            round = rounds,
            discovered = next_frontier.len(),
            "tail traversal round complete"
        );
        frontier = next_frontier;
    }

    tracing::debug!(
        records = tail.records.len(),
        relations = tail.relations.len(),
        rounds,
        "tail traversal finished"
    );
    Ok(tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AuthInfo;
    use crate::metadata::Metadata;
    use crate::storage::InMemoryAdapter;
    use crate::value::Attributes;
    use crate::Error;

    fn connected() -> InMemoryAdapter {
        let mut adapter = InMemoryAdapter::new();
        adapter.connect(&AuthInfo::new()).unwrap();
        adapter
    }

    fn add_record(adapter: &mut InMemoryAdapter, id: &str) {
        adapter
            .save_record(Attributes::new(), Metadata::new("prov:Entity", id))
            .unwrap();
    }

    fn add_relation(adapter: &mut InMemoryAdapter, id: &str, from: &str, to: &str) {
        adapter
            .save_relation(from, to, Attributes::new(), Metadata::new("prov:Derivation", id))
            .unwrap();
    }

    fn seed(id: &str) -> Filter {
        Filter::all().with_metadata("identifier", id)
    }

    /// a -> b -> c -> d
    fn chain() -> InMemoryAdapter {
        let mut adapter = connected();
        for id in ["ex:a", "ex:b", "ex:c", "ex:d"] {
            add_record(&mut adapter, id);
        }
        add_relation(&mut adapter, "ex:ab", "ex:a", "ex:b");
        add_relation(&mut adapter, "ex:bc", "ex:b", "ex:c");
        add_relation(&mut adapter, "ex:cd", "ex:c", "ex:d");
        adapter
    }

    #[test]
    fn test_depth_zero_returns_seeds_only() {
        let adapter = chain();
        let tail = traverse(&adapter, &seed("ex:a"), Some(0)).unwrap();
        assert_eq!(tail.records.len(), 1);
        assert!(tail.relations.is_empty());
    }

    #[test]
    fn test_depth_limits_hops() {
        let adapter = chain();
        let tail = traverse(&adapter, &seed("ex:a"), Some(2)).unwrap();
        assert_eq!(tail.record_ids(), HashSet::from(["ex:a", "ex:b", "ex:c"]));
        assert_eq!(tail.relation_ids(), HashSet::from(["ex:ab", "ex:bc"]));
    }

    #[test]
    fn test_walks_both_directions() {
        let adapter = chain();
        let tail = traverse(&adapter, &seed("ex:c"), Some(1)).unwrap();
        assert_eq!(tail.record_ids(), HashSet::from(["ex:b", "ex:c", "ex:d"]));
    }

    #[test]
    fn test_unbounded_terminates_on_cycle() {
        let mut adapter = connected();
        add_record(&mut adapter, "ex:a");
        add_record(&mut adapter, "ex:b");
        add_relation(&mut adapter, "ex:ab", "ex:a", "ex:b");
        add_relation(&mut adapter, "ex:ba", "ex:b", "ex:a");

        let tail = traverse(&adapter, &seed("ex:a"), None).unwrap();
        assert_eq!(tail.records.len(), 2);
        assert_eq!(tail.relations.len(), 2);
    }

    #[test]
    fn test_self_loop_visited_once() {
        let mut adapter = connected();
        add_record(&mut adapter, "ex:a");
        add_relation(&mut adapter, "ex:aa", "ex:a", "ex:a");

        let tail = traverse(&adapter, &seed("ex:a"), None).unwrap();
        assert_eq!(tail.records.len(), 1);
        assert_eq!(tail.relations.len(), 1);
    }

    #[test]
    fn test_dangling_endpoint_is_not_found() {
        let mut adapter = chain();
        adapter.delete_record("ex:b").unwrap();

        let err = traverse(&adapter, &seed("ex:a"), None).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id, .. } if id == "ex:b"));
    }

    #[test]
    fn test_into_bundle() {
        let adapter = chain();
        let bundle = traverse(&adapter, &seed("ex:d"), None).unwrap().into_bundle(None);
        assert_eq!(bundle.records.len(), 4);
        assert_eq!(bundle.relations.len(), 3);
        assert!(bundle.bundle_record.is_none());
    }
}
