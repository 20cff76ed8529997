//! # provdb - PROV graph persistence adapters
//!
//! Backend-agnostic storage contract for W3C PROV provenance graphs.
//!
//! provdb provides:
//! - A storage-facing record/relation schema with a reserved metadata vocabulary
//! - Lossless typed attributes for backends that can only store primitives
//! - Merge policies for re-saving existing identifiers
//! - Exact-match filtering and bounded "tail" traversal over stored relations
//! - In-memory and SQLite-backed adapters behind one `ProvAdapter` trait

pub mod value;
pub mod metadata;
pub mod record;
pub mod merge;
pub mod filter;
pub mod tail;
pub mod adapter;
pub mod storage;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use value::{AttributeValue, Attributes, Literal, TypeMap};
pub use metadata::{Metadata, MetadataValue};
pub use record::{DbBundle, DbDocument, DbRecord, DbRelation};
pub use merge::MergeBehaviour;
pub use filter::Filter;
pub use tail::Tail;
pub use adapter::{AuthInfo, ProvAdapter};
pub use storage::{InMemoryAdapter, SqliteAdapter};

/// Result type alias for provdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// The two kinds of stored items, used to give errors context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Record,
    Relation,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Record => "record",
            ItemKind::Relation => "relation",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error types for adapter operations
///
/// Every adapter failure is one of these variants. `CreateRecord`,
/// `CreateRelation`, `NotFound`, `Merge` and the backend failures are all
/// database-class errors, see [`Error::is_database_error`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Failed to create record {id}: {reason}")]
    CreateRecord { id: String, reason: String },

    #[error("Failed to create relation {id}: {reason}")]
    CreateRelation { id: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: ItemKind, id: String },

    #[error("{kind} {id} already exists and the merge behaviour is no_merge")]
    Merge { kind: ItemKind, id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_found(kind: ItemKind, id: impl Into<String>) -> Self {
        Error::NotFound { kind, id: id.into() }
    }

    /// Whether this error belongs to the database family rather than being a
    /// configuration or connection problem
    pub fn is_database_error(&self) -> bool {
        !matches!(self, Error::InvalidOptions(_) | Error::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_families() {
        assert!(!Error::InvalidOptions("x".into()).is_database_error());
        assert!(!Error::Auth("x".into()).is_database_error());
        assert!(Error::not_found(ItemKind::Record, "ex:a").is_database_error());
        assert!(Error::Merge { kind: ItemKind::Relation, id: "ex:r".into() }.is_database_error());
        assert!(Error::Database("bad tag".into()).is_database_error());
    }

    #[test]
    fn test_error_messages_carry_identifier() {
        let err = Error::not_found(ItemKind::Record, "ex:alice");
        assert_eq!(err.to_string(), "record not found: ex:alice");

        let err = Error::Merge { kind: ItemKind::Relation, id: "ex:assoc".into() };
        assert!(err.to_string().contains("ex:assoc"));
    }
}
