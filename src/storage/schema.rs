//! Database schema definitions

/// SQL to create the records table
///
/// `attributes` holds the flattened `[key, value]` pairs as JSON; `metadata`
/// holds the full metadata mapping (including the type map) as JSON.
pub const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    identifier TEXT PRIMARY KEY,
    prov_type TEXT NOT NULL,
    parent_id TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL,
    metadata TEXT NOT NULL
)
"#;

/// SQL to create the relations table
pub const CREATE_RELATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relations (
    identifier TEXT PRIMARY KEY,
    from_node TEXT NOT NULL,
    to_node TEXT NOT NULL,
    prov_type TEXT NOT NULL,
    parent_id TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL,
    metadata TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_records_prov_type ON records(prov_type)",
    "CREATE INDEX IF NOT EXISTS idx_records_parent ON records(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_node)",
    "CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_node)",
    "CREATE INDEX IF NOT EXISTS idx_relations_parent ON relations(parent_id)",
];

/// Metadata keys mirrored into indexed columns; a filter pinning one of
/// them narrows the scan in SQL before the full match runs.
pub const INDEXED_METADATA_COLUMNS: &[(&str, &str)] = &[
    ("identifier", "identifier"),
    ("prov_type", "prov_type"),
    ("parent_id", "parent_id"),
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_RECORDS_TABLE, CREATE_RELATIONS_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
