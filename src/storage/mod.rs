//! Storage backends
//!
//! - `memory`: ordered maps in process memory, values kept in native form
//! - `sqlite`: SQLite tables, attributes flattened to strings
//!   (records(identifier, prov_type, parent_id, attributes, metadata),
//!   relations(identifier, from_node, to_node, prov_type, parent_id, attributes, metadata))

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::InMemoryAdapter;
pub use sqlite::{SqliteAdapter, SqliteOptions};
