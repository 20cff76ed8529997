//! Adapter contract tests, run against every backend.

use chrono::{TimeZone, Utc};
use provdb::adapter::{save_document, AuthInfo, ProvAdapter};
use provdb::metadata::{Metadata, METADATA_KEY_NAMESPACES};
use provdb::storage::sqlite::SqliteOptions;
use provdb::value::{AttributeValue, Attributes, Literal};
use provdb::{DbRecord, DbRelation, Error, Filter, InMemoryAdapter, MergeBehaviour, SqliteAdapter};

type Backend = (Box<dyn ProvAdapter>, AuthInfo);

fn memory_backend() -> Backend {
    (Box::new(InMemoryAdapter::new()), AuthInfo::new())
}

fn sqlite_backend() -> Backend {
    (Box::new(SqliteAdapter::new()), SqliteOptions::in_memory().to_auth_info())
}

fn connect((mut adapter, auth): Backend) -> Box<dyn ProvAdapter> {
    adapter.connect(&auth).unwrap();
    adapter
}

fn entity(id: &str) -> Metadata {
    Metadata::new("prov:Entity", id)
}

fn add_record(adapter: &mut dyn ProvAdapter, id: &str) {
    adapter.save_record(Attributes::new(), entity(id)).unwrap();
}

fn add_relation(adapter: &mut dyn ProvAdapter, id: &str, from: &str, to: &str) {
    adapter
        .save_relation(from, to, Attributes::new(), Metadata::new("prov:Derivation", id))
        .unwrap();
}

fn by_id(id: &str) -> Filter {
    Filter::all().with_metadata("identifier", id)
}

fn typed_attributes() -> Attributes {
    Attributes::new()
        .with("ex:title", "Quarterly report")
        .with("ex:pages", 42i64)
        .with("ex:score", 0.75f64)
        .with("ex:final", true)
        .with("ex:created", Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        .with("ex:author", AttributeValue::QualifiedName("ex:alice".to_string()))
        .with("ex:label", Literal::new("rapport", "xsd:string").with_langtag("fr"))
        .with("ex:tag", "draft")
        .with("ex:tag", 7i64)
        .with("ex:tag", AttributeValue::QualifiedName("ex:reviewed".to_string()))
}

// ========== Round trip ==========

fn round_trip_records(backend: Backend) {
    let mut adapter = connect(backend);
    let metadata = entity("ex:report").with_namespace("ex", "http://example.org/");

    let id = adapter.save_record(typed_attributes(), metadata.clone()).unwrap();
    assert_eq!(id, "ex:report");

    let expected = DbRecord::normalized(typed_attributes(), metadata).unwrap();
    let fetched = adapter.get_record("ex:report").unwrap();
    assert_eq!(fetched, expected);
    assert!(fetched.metadata.has_reserved_keys());
    assert_eq!(fetched.attributes.get_all("ex:tag").count(), 3);
}

fn round_trip_relations(backend: Backend) {
    let mut adapter = connect(backend);
    add_record(adapter.as_mut(), "ex:report");
    add_record(adapter.as_mut(), "ex:draft");

    let attributes = Attributes::new().with("prov:role", "editor").with("ex:step", 2i64);
    let id = adapter
        .save_relation("ex:report", "ex:draft", attributes.clone(), Metadata::new("prov:Derivation", ""))
        .unwrap();
    assert!(id.starts_with("_:rel-"));

    let relation = adapter.get_relation(&id).unwrap();
    assert_eq!(relation.from_node, "ex:report");
    assert_eq!(relation.to_node, "ex:draft");
    assert_eq!(relation.attributes, attributes);
    assert_eq!(relation.metadata.prov_type(), "prov:Derivation");
}

fn document_round_trip(backend: Backend) {
    let mut source = connect(memory_backend());
    source
        .save_record(Attributes::new(), Metadata::new("prov:Bundle", "ex:bundle"))
        .unwrap();
    source
        .save_record(typed_attributes(), entity("ex:report").with_parent("ex:bundle"))
        .unwrap();
    source
        .save_record(Attributes::new(), Metadata::new("prov:Agent", "ex:alice"))
        .unwrap();
    source
        .save_relation(
            "ex:report",
            "ex:alice",
            Attributes::new(),
            Metadata::new("prov:Attribution", "ex:attr").with_parent("ex:bundle"),
        )
        .unwrap();
    let document = source.get_document().unwrap();

    let mut target = connect(backend);
    let summary = save_document(target.as_mut(), &document).unwrap();
    assert_eq!(summary.records, 3);
    assert_eq!(summary.relations, 1);
    assert_eq!(target.get_document().unwrap(), document);

    let bundle = target.get_bundle("ex:bundle").unwrap();
    assert_eq!(bundle.records.len(), 1);
    assert_eq!(bundle.relations.len(), 1);
}

// ========== Merge policy ==========

fn no_merge_rejects_collision(backend: Backend) {
    let mut adapter = connect(backend);
    assert_eq!(adapter.merge_behaviour(), MergeBehaviour::NoMerge);

    adapter
        .save_record(Attributes::new().with("ex:v", 1i64), entity("ex:e"))
        .unwrap();
    let err = adapter
        .save_record(Attributes::new().with("ex:v", 2i64), entity("ex:e"))
        .unwrap_err();
    assert!(matches!(err, Error::Merge { ref id, .. } if id == "ex:e"));
    assert!(err.is_database_error());

    let stored = adapter.get_record("ex:e").unwrap();
    assert_eq!(stored.attributes.get("ex:v"), Some(&AttributeValue::Int(1)));
}

fn soft_merge_keeps_stored_values(backend: Backend) {
    let mut adapter = connect(backend);
    adapter.set_merge_behaviour(MergeBehaviour::Soft);

    adapter
        .save_record(
            Attributes::new().with("ex:v", 1i64),
            entity("ex:e").with_namespace("ex", "http://example.org/"),
        )
        .unwrap();
    adapter
        .save_record(
            Attributes::new().with("ex:v", 2i64).with("ex:w", "new"),
            entity("ex:e")
                .with_namespace("ex", "http://elsewhere.org/")
                .with_namespace("foaf", "http://xmlns.com/foaf/0.1/"),
        )
        .unwrap();

    let stored = adapter.get_record("ex:e").unwrap();
    assert_eq!(stored.attributes.get_all("ex:v").collect::<Vec<_>>(), vec![&AttributeValue::Int(1)]);
    assert_eq!(stored.attributes.get("ex:w"), Some(&AttributeValue::from("new")));

    let namespaces = stored.metadata.namespaces();
    assert_eq!(namespaces["ex"], "http://example.org/");
    assert_eq!(namespaces["foaf"], "http://xmlns.com/foaf/0.1/");
    assert!(stored.metadata.get(METADATA_KEY_NAMESPACES).is_some());
    assert!(stored.metadata.type_map().contains_key("ex:v"));
}

fn soft_merge_keeps_stored_parent(backend: Backend) {
    let mut adapter = connect(backend);
    adapter.set_merge_behaviour(MergeBehaviour::Soft);
    adapter
        .save_record(Attributes::new(), Metadata::new("prov:Bundle", "ex:b1"))
        .unwrap();

    add_record(adapter.as_mut(), "ex:e");
    adapter
        .save_record(Attributes::new().with("ex:w", "new"), entity("ex:e").with_parent("ex:b1"))
        .unwrap();

    let stored = adapter.get_record("ex:e").unwrap();
    assert_eq!(stored.metadata.parent_id(), "");
    assert_eq!(stored.attributes.get("ex:w"), Some(&AttributeValue::from("new")));

    let document = adapter.get_document().unwrap();
    assert!(document.document.records.iter().any(|r| r.identifier() == "ex:e"));
    assert!(adapter.get_bundle("ex:b1").unwrap().records.is_empty());
}

fn soft_merge_extends_anonymous_relation(backend: Backend) {
    let mut adapter = connect(backend);
    adapter.set_merge_behaviour(MergeBehaviour::Soft);
    add_record(adapter.as_mut(), "ex:a");
    add_record(adapter.as_mut(), "ex:b");

    let first = adapter
        .save_relation(
            "ex:a",
            "ex:b",
            Attributes::new().with("prov:role", "editor"),
            Metadata::new("prov:Derivation", ""),
        )
        .unwrap();
    let second = adapter
        .save_relation(
            "ex:a",
            "ex:b",
            Attributes::new().with("prov:role", "editor").with("ex:step", 2i64),
            Metadata::new("prov:Derivation", ""),
        )
        .unwrap();
    assert_eq!(first, second);

    let relations = adapter.get_relations_by_filter(&Filter::all()).unwrap();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].attributes.get_all("prov:role").count(), 1);
    assert_eq!(relations[0].attributes.get("ex:step"), Some(&AttributeValue::Int(2)));
}

fn override_replaces_wholesale(backend: Backend) {
    let mut adapter = connect(backend);
    adapter.set_merge_behaviour(MergeBehaviour::Override);

    adapter
        .save_record(Attributes::new().with("ex:v", 1i64).with("ex:old", "x"), entity("ex:e"))
        .unwrap();
    adapter
        .save_record(Attributes::new().with("ex:v", 2i64), entity("ex:e"))
        .unwrap();

    let stored = adapter.get_record("ex:e").unwrap();
    assert_eq!(stored.attributes, Attributes::new().with("ex:v", 2i64));
}

fn merge_behaviour_applies_to_later_saves(backend: Backend) {
    let mut adapter = connect(backend);
    add_record(adapter.as_mut(), "ex:a");
    add_record(adapter.as_mut(), "ex:b");
    add_relation(adapter.as_mut(), "ex:r", "ex:a", "ex:b");

    let again = adapter.save_relation("ex:a", "ex:b", Attributes::new(), Metadata::new("prov:Derivation", "ex:r"));
    assert!(matches!(again, Err(Error::Merge { .. })));

    adapter.set_merge_behaviour(MergeBehaviour::Soft);
    adapter
        .save_relation("ex:a", "ex:b", Attributes::new().with("ex:note", "x"), Metadata::new("prov:Derivation", "ex:r"))
        .unwrap();
    let relation = adapter.get_relation("ex:r").unwrap();
    assert_eq!(relation.attributes.get("ex:note"), Some(&AttributeValue::from("x")));
}

// ========== Filters ==========

fn filter_records(backend: Backend) {
    let mut adapter = connect(backend);
    adapter
        .save_record(Attributes::new().with("ex:pages", 10i64).with("ex:tag", "a").with("ex:tag", "b"), entity("ex:one"))
        .unwrap();
    adapter
        .save_record(Attributes::new().with("ex:pages", 20i64), entity("ex:two"))
        .unwrap();
    adapter
        .save_record(Attributes::new().with("ex:pages", "10"), Metadata::new("prov:Agent", "ex:three"))
        .unwrap();

    let all = adapter.get_records_by_filter(&Filter::all()).unwrap();
    assert_eq!(all.len(), 3);

    let ten = adapter.get_records_by_filter(&Filter::all().with_property("ex:pages", 10i64)).unwrap();
    assert_eq!(ten.len(), 1);
    assert_eq!(ten[0].identifier(), "ex:one");

    let tagged = adapter.get_records_by_filter(&Filter::all().with_property("ex:tag", "b")).unwrap();
    assert_eq!(tagged.len(), 1);

    let agents = adapter
        .get_records_by_filter(&Filter::all().with_metadata("prov_type", "prov:Agent"))
        .unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].identifier(), "ex:three");

    let none = adapter
        .get_records_by_filter(&Filter::all().with_property("ex:pages", 20i64).with_metadata("prov_type", "prov:Agent"))
        .unwrap();
    assert!(none.is_empty());
}

fn filter_relations(backend: Backend) {
    let mut adapter = connect(backend);
    for id in ["ex:a", "ex:b", "ex:c"] {
        add_record(adapter.as_mut(), id);
    }
    add_relation(adapter.as_mut(), "ex:ab", "ex:a", "ex:b");
    adapter
        .save_relation("ex:b", "ex:c", Attributes::new(), Metadata::new("prov:Usage", "ex:bc"))
        .unwrap();

    let usages = adapter
        .get_relations_by_filter(&Filter::all().with_metadata("prov_type", "prov:Usage"))
        .unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].identifier(), "ex:bc");

    let touching_b = adapter.get_relations_for_records(&["ex:b".to_string()]).unwrap();
    assert_eq!(touching_b.len(), 2);
}

fn delete_by_filter_leaves_relations(backend: Backend) {
    let mut adapter = connect(backend);
    add_record(adapter.as_mut(), "ex:a");
    add_record(adapter.as_mut(), "ex:b");
    adapter
        .save_record(Attributes::new(), Metadata::new("prov:Agent", "ex:bob"))
        .unwrap();
    add_relation(adapter.as_mut(), "ex:ab", "ex:a", "ex:b");

    let deleted = adapter
        .delete_records_by_filter(&Filter::all().with_metadata("prov_type", "prov:Entity"))
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(adapter.get_records_by_filter(&Filter::all()).unwrap().len(), 1);
    assert_eq!(adapter.get_relations_by_filter(&Filter::all()).unwrap().len(), 1);
}

// ========== Tail traversal ==========

fn tail_depth_zero_returns_seeds(backend: Backend) {
    let mut adapter = connect(backend);
    add_record(adapter.as_mut(), "ex:a");
    add_record(adapter.as_mut(), "ex:b");
    add_relation(adapter.as_mut(), "ex:ab", "ex:a", "ex:b");

    let tail = adapter.get_records_tail(&by_id("ex:a"), Some(0)).unwrap();
    assert_eq!(tail.records.len(), 1);
    assert!(tail.relations.is_empty());

    let tail = adapter.get_records_tail(&by_id("ex:a"), Some(1)).unwrap();
    assert_eq!(tail.records.len(), 2);
    assert_eq!(tail.relations.len(), 1);
}

fn tail_terminates_on_cycles(backend: Backend) {
    let mut adapter = connect(backend);
    for id in ["ex:a", "ex:b", "ex:c"] {
        add_record(adapter.as_mut(), id);
    }
    add_relation(adapter.as_mut(), "ex:ab", "ex:a", "ex:b");
    add_relation(adapter.as_mut(), "ex:bc", "ex:b", "ex:c");
    add_relation(adapter.as_mut(), "ex:ca", "ex:c", "ex:a");
    add_relation(adapter.as_mut(), "ex:aa", "ex:a", "ex:a");

    let tail = adapter.get_records_tail(&by_id("ex:b"), None).unwrap();
    assert_eq!(tail.record_ids().len(), 3);
    assert_eq!(tail.records.len(), 3);
    assert_eq!(tail.relations.len(), 4);
}

fn tail_dangling_endpoint_is_not_found(backend: Backend) {
    let mut adapter = connect(backend);
    for id in ["ex:a", "ex:b", "ex:c"] {
        add_record(adapter.as_mut(), id);
    }
    add_relation(adapter.as_mut(), "ex:ab", "ex:a", "ex:b");
    add_relation(adapter.as_mut(), "ex:bc", "ex:b", "ex:c");
    adapter.delete_record("ex:c").unwrap();

    let err = adapter.get_records_tail(&by_id("ex:a"), None).unwrap_err();
    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "ex:c"));

    // Within one hop the dangling relation is never reached
    assert!(adapter.get_records_tail(&by_id("ex:a"), Some(1)).is_ok());
}

// ========== Not found ==========

fn missing_items_are_not_found(backend: Backend) {
    let mut adapter = connect(backend);
    add_record(adapter.as_mut(), "ex:a");
    add_record(adapter.as_mut(), "ex:b");
    add_relation(adapter.as_mut(), "ex:ab", "ex:a", "ex:b");

    assert!(matches!(adapter.get_record("ex:zzz"), Err(Error::NotFound { .. })));
    assert!(matches!(adapter.get_relation("ex:zzz"), Err(Error::NotFound { .. })));

    let err = adapter
        .save_relation("ex:a", "ex:zzz", Attributes::new(), Metadata::new("prov:Derivation", "ex:az"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "ex:zzz"));

    adapter.delete_record("ex:b").unwrap();
    let err = adapter.get_relation("ex:ab").unwrap_err();
    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "ex:b"));

    adapter.delete_relation("ex:ab").unwrap();
    assert!(matches!(adapter.delete_relation("ex:ab"), Err(Error::NotFound { .. })));
    assert!(matches!(adapter.delete_record("ex:b"), Err(Error::NotFound { .. })));
}

fn record_without_identifier_is_rejected(backend: Backend) {
    let mut adapter = connect(backend);
    let err = adapter.save_record(Attributes::new(), entity("")).unwrap_err();
    assert!(matches!(err, Error::CreateRecord { .. }));
}

// ========== Connection gating ==========

fn operations_require_connection((mut adapter, auth): Backend) {
    assert!(!adapter.is_connected());
    assert!(matches!(adapter.get_record("ex:a"), Err(Error::Auth(_))));
    assert!(matches!(adapter.save_record(Attributes::new(), entity("ex:a")), Err(Error::Auth(_))));
    assert!(matches!(adapter.get_records_by_filter(&Filter::all()), Err(Error::Auth(_))));
    assert!(matches!(adapter.get_records_tail(&Filter::all(), None), Err(Error::Auth(_))));
    assert!(matches!(adapter.delete_records_by_filter(&Filter::all()), Err(Error::Auth(_))));

    adapter.connect(&auth).unwrap();
    add_record(adapter.as_mut(), "ex:a");

    adapter.disconnect();
    assert!(!adapter.is_connected());
    let err = adapter.get_record("ex:a").unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(!err.is_database_error());
}

macro_rules! contract_suite {
    ($backend:ident, $make:path) => {
        mod $backend {
            use super::*;

            #[test]
            fn test_round_trip_records() {
                round_trip_records($make());
            }

            #[test]
            fn test_round_trip_relations() {
                round_trip_relations($make());
            }

            #[test]
            fn test_document_round_trip() {
                document_round_trip($make());
            }

            #[test]
            fn test_no_merge_rejects_collision() {
                no_merge_rejects_collision($make());
            }

            #[test]
            fn test_soft_merge_keeps_stored_values() {
                soft_merge_keeps_stored_values($make());
            }

            #[test]
            fn test_soft_merge_keeps_stored_parent() {
                soft_merge_keeps_stored_parent($make());
            }

            #[test]
            fn test_soft_merge_extends_anonymous_relation() {
                soft_merge_extends_anonymous_relation($make());
            }

            #[test]
            fn test_override_replaces_wholesale() {
                override_replaces_wholesale($make());
            }

            #[test]
            fn test_merge_behaviour_applies_to_later_saves() {
                merge_behaviour_applies_to_later_saves($make());
            }

            #[test]
            fn test_filter_records() {
                filter_records($make());
            }

            #[test]
            fn test_filter_relations() {
                filter_relations($make());
            }

            #[test]
            fn test_delete_by_filter_leaves_relations() {
                delete_by_filter_leaves_relations($make());
            }

            #[test]
            fn test_tail_depth_zero_returns_seeds() {
                tail_depth_zero_returns_seeds($make());
            }

            #[test]
            fn test_tail_terminates_on_cycles() {
                tail_terminates_on_cycles($make());
            }

            #[test]
            fn test_tail_dangling_endpoint_is_not_found() {
                tail_dangling_endpoint_is_not_found($make());
            }

            #[test]
            fn test_missing_items_are_not_found() {
                missing_items_are_not_found($make());
            }

            #[test]
            fn test_record_without_identifier_is_rejected() {
                record_without_identifier_is_rejected($make());
            }

            #[test]
            fn test_operations_require_connection() {
                operations_require_connection($make());
            }
        }
    };
}

contract_suite!(memory, super::memory_backend);
contract_suite!(sqlite, super::sqlite_backend);

#[test]
fn test_relation_endpoints_are_not_attributes() {
    let relation = DbRelation::normalized("ex:a", "ex:b", Attributes::new(), Metadata::new("prov:Derivation", "ex:r")).unwrap();
    assert!(relation.attributes.is_empty());
    assert!(relation.touches("ex:a") && relation.touches("ex:b"));
}
