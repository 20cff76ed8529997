//! SQLite storage implementation
//!
//! Attributes are written in their encoded primitive form (`[key, raw]` pairs
//! as JSON); the type map travels inside the metadata column and restores the
//! native values on read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use crate::adapter::{check_endpoints, not_connected, AuthInfo, ProvAdapter};
use crate::filter::Filter;
use crate::merge::{self, MergeBehaviour};
use crate::metadata::Metadata;
use crate::record::{DbRecord, DbRelation};
use crate::value::{self, Attributes};
use crate::{Error, ItemKind, Result};
use super::schema;

pub const AUTH_KEY_PATH: &str = "path";
pub const AUTH_KEY_CREATE: &str = "create";
/// `path` value selecting a private in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

const BACKEND_NAME: &str = "sqlite";

/// Connection options parsed from [`AuthInfo`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub path: PathBuf,
    /// Create the database file if it does not exist
    pub create: bool,
}

impl SqliteOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: true,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_PATH)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(IN_MEMORY_PATH)
    }

    pub fn from_auth_info(auth: &AuthInfo) -> Result<Self> {
        if let Some(unknown) = auth
            .keys()
            .find(|k| k.as_str() != AUTH_KEY_PATH && k.as_str() != AUTH_KEY_CREATE)
        {
            return Err(Error::InvalidOptions(format!(
                "unknown sqlite option {:?} (expected {} or {})",
                unknown, AUTH_KEY_PATH, AUTH_KEY_CREATE
            )));
        }

        let path = match auth.get(AUTH_KEY_PATH) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                return Err(Error::InvalidOptions(format!(
                    "sqlite option {:?} is required",
                    AUTH_KEY_PATH
                )));
            }
        };

        let create = match auth.get(AUTH_KEY_CREATE).map(|s| s.trim().to_lowercase()) {
            None => true,
            Some(flag) => match flag.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(Error::InvalidOptions(format!(
                        "sqlite option {:?} must be true or false, got {:?}",
                        AUTH_KEY_CREATE, flag
                    )));
                }
            },
        };

        Ok(Self { path, create })
    }

    pub fn to_auth_info(&self) -> AuthInfo {
        AuthInfo::from([
            (AUTH_KEY_PATH.to_string(), self.path.display().to_string()),
            (AUTH_KEY_CREATE.to_string(), self.create.to_string()),
        ])
    }

    fn open(&self) -> Result<Connection> {
        let opened = if self.is_in_memory() {
            Connection::open_in_memory()
        } else {
            let mut flags = OpenFlags::default();
            if !self.create {
                flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
            }
            Connection::open_with_flags(&self.path, flags)
        };

        opened.map_err(|e| Error::Auth(format!("cannot open {}: {}", self.path.display(), e)))
    }
}

/// SQLite-backed storage for PROV records and relations
#[derive(Debug, Default)]
pub struct SqliteAdapter {
    conn: Option<Connection>,
    options: Option<SqliteOptions>,
    merge_behaviour: MergeBehaviour,
}

impl SqliteAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options of the current connection
    pub fn options(&self) -> Option<&SqliteOptions> {
        self.options.as_ref()
    }

    fn conn(&self, operation: &str) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| not_connected(BACKEND_NAME, operation))
    }

    fn conn_mut(&mut self, operation: &str) -> Result<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| not_connected(BACKEND_NAME, operation))
    }
}

impl ProvAdapter for SqliteAdapter {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn connect(&mut self, auth: &AuthInfo) -> Result<()> {
        let options = SqliteOptions::from_auth_info(auth)?;
        if self.conn.is_some() && self.options.as_ref() == Some(&options) {
            tracing::debug!(path = %options.path.display(), "sqlite backend already connected");
            return Ok(());
        }

        let conn = options.open()?;
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }

        if self.conn.is_some() {
            tracing::warn!(path = %options.path.display(), "replacing open sqlite connection");
            self.disconnect();
        }

        tracing::info!(path = %options.path.display(), "connected sqlite backend");
        self.conn = Some(conn);
        self.options = Some(options);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!("error closing sqlite connection: {}", e);
            }
            tracing::info!("disconnected sqlite backend");
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn merge_behaviour(&self) -> MergeBehaviour {
        self.merge_behaviour
    }

    fn set_merge_behaviour(&mut self, behaviour: MergeBehaviour) {
        self.merge_behaviour = behaviour;
    }

    fn save_record(&mut self, attributes: Attributes, metadata: Metadata) -> Result<String> {
        let behaviour = self.merge_behaviour;
        let conn = self.conn_mut("save_record")?;

        let incoming = DbRecord::normalized(attributes, metadata)?;
        let id = incoming.identifier().to_string();
        if id.is_empty() {
            return Err(Error::CreateRecord {
                id,
                reason: "metadata has no identifier".to_string(),
            });
        }

        let tx = conn.transaction()?;
        let record = match fetch_record(&tx, &id)? {
            Some(existing) => merge::merge_record(behaviour, existing, incoming)?,
            None => incoming,
        };
        write_record(&tx, &record).map_err(|e| Error::CreateRecord {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        tx.commit()?;

        tracing::debug!(record = %id, merge = %behaviour, "saved record");
        Ok(id)
    }

    fn save_relation(
        &mut self,
        from_node: &str,
        to_node: &str,
        attributes: Attributes,
        metadata: Metadata,
    ) -> Result<String> {
        let behaviour = self.merge_behaviour;
        let conn = self.conn_mut("save_relation")?;

        let incoming = DbRelation::normalized(from_node, to_node, attributes, metadata)?;
        let id = incoming.identifier().to_string();

        let tx = conn.transaction()?;
        check_endpoints(&incoming, |record_id| record_exists(&tx, record_id))?;
        let relation = match fetch_relation(&tx, &id)? {
            Some(existing) => merge::merge_relation(behaviour, existing, incoming)?,
            None => incoming,
        };
        write_relation(&tx, &relation).map_err(|e| Error::CreateRelation {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        tx.commit()?;

        tracing::debug!(relation = %id, from = from_node, to = to_node, "saved relation");
        Ok(id)
    }

    fn get_record(&self, record_id: &str) -> Result<DbRecord> {
        let conn = self.conn("get_record")?;
        fetch_record(conn, record_id)?.ok_or_else(|| Error::not_found(ItemKind::Record, record_id))
    }

    fn get_relation(&self, relation_id: &str) -> Result<DbRelation> {
        let conn = self.conn("get_relation")?;
        let relation = fetch_relation(conn, relation_id)?
            .ok_or_else(|| Error::not_found(ItemKind::Relation, relation_id))?;
        check_endpoints(&relation, |record_id| record_exists(conn, record_id))?;
        Ok(relation)
    }

    fn get_records_by_filter(&self, filter: &Filter) -> Result<Vec<DbRecord>> {
        let conn = self.conn("get_records_by_filter")?;
        query_records(conn, filter)
    }

    fn get_relations_by_filter(&self, filter: &Filter) -> Result<Vec<DbRelation>> {
        let conn = self.conn("get_relations_by_filter")?;
        query_relations(conn, filter)
    }

    fn get_relations_for_records(&self, record_ids: &[String]) -> Result<Vec<DbRelation>> {
        let conn = self.conn("get_relations_for_records")?;
        let mut stmt = conn.prepare(
            "SELECT from_node, to_node, attributes, metadata FROM relations WHERE from_node = ?1 OR to_node = ?1",
        )?;

        let mut found: BTreeMap<String, DbRelation> = BTreeMap::new();
        for record_id in record_ids {
            let rows = stmt
                .query_map([record_id], relation_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for row in rows {
                let relation = row.decode()?;
                found.entry(relation.identifier().to_string()).or_insert(relation);
            }
        }

        Ok(found.into_values().collect())
    }

    fn delete_records_by_filter(&mut self, filter: &Filter) -> Result<usize> {
        let conn = self.conn_mut("delete_records_by_filter")?;
        let tx = conn.transaction()?;

        let matching = query_records(&tx, filter)?;
        for record in &matching {
            tx.execute("DELETE FROM records WHERE identifier = ?1", [record.identifier()])?;
        }
        tx.commit()?;

        tracing::debug!(deleted = matching.len(), "deleted records by filter");
        Ok(matching.len())
    }

    fn delete_record(&mut self, record_id: &str) -> Result<()> {
        let conn = self.conn("delete_record")?;
        let deleted = conn.execute("DELETE FROM records WHERE identifier = ?1", [record_id])?;
        if deleted == 0 {
            return Err(Error::not_found(ItemKind::Record, record_id));
        }
        tracing::debug!(record = record_id, "deleted record");
        Ok(())
    }

    fn delete_relation(&mut self, relation_id: &str) -> Result<()> {
        let conn = self.conn("delete_relation")?;
        let deleted = conn.execute("DELETE FROM relations WHERE identifier = ?1", [relation_id])?;
        if deleted == 0 {
            return Err(Error::not_found(ItemKind::Relation, relation_id));
        }
        tracing::debug!(relation = relation_id, "deleted relation");
        Ok(())
    }
}

// ========== Row Encoding ==========

/// Columns as read back from the database, before type-map decoding
struct StoredRow {
    endpoints: Option<(String, String)>,
    attributes: String,
    metadata: String,
}

impl StoredRow {
    fn decode_parts(&self) -> Result<(Attributes, Metadata)> {
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;
        let flat: Vec<(String, String)> = serde_json::from_str(&self.attributes)?;
        let attributes = value::decode(&flat, &metadata.type_map())?;
        Ok((attributes, metadata))
    }

    fn decode_record(&self) -> Result<DbRecord> {
        let (attributes, metadata) = self.decode_parts()?;
        Ok(DbRecord::new(attributes, metadata))
    }

    fn decode(&self) -> Result<DbRelation> {
        let (attributes, metadata) = self.decode_parts()?;
        let (from_node, to_node) = self
            .endpoints
            .clone()
            .ok_or_else(|| Error::Database("relation row without endpoints".to_string()))?;
        Ok(DbRelation::new(from_node, to_node, attributes, metadata))
    }
}

fn record_row(row: &rusqlite::Row) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        endpoints: None,
        attributes: row.get(0)?,
        metadata: row.get(1)?,
    })
}

fn relation_row(row: &rusqlite::Row) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        endpoints: Some((row.get(0)?, row.get(1)?)),
        attributes: row.get(2)?,
        metadata: row.get(3)?,
    })
}

fn write_record(conn: &Connection, record: &DbRecord) -> Result<()> {
    let (flat, _) = value::encode(&record.attributes)?;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO records (identifier, prov_type, parent_id, attributes, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            record.identifier(),
            record.metadata.prov_type(),
            record.metadata.parent_id(),
            serde_json::to_string(&flat)?,
            serde_json::to_string(&record.metadata)?,
        ],
    )?;
    Ok(())
}

fn write_relation(conn: &Connection, relation: &DbRelation) -> Result<()> {
    let (flat, _) = value::encode(&relation.attributes)?;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO relations (identifier, from_node, to_node, prov_type, parent_id, attributes, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            relation.identifier(),
            relation.from_node,
            relation.to_node,
            relation.metadata.prov_type(),
            relation.metadata.parent_id(),
            serde_json::to_string(&flat)?,
            serde_json::to_string(&relation.metadata)?,
        ],
    )?;
    Ok(())
}

// ========== Queries ==========

fn record_exists(conn: &Connection, record_id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM records WHERE identifier = ?1", [record_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn fetch_record(conn: &Connection, record_id: &str) -> Result<Option<DbRecord>> {
    conn.query_row(
        "SELECT attributes, metadata FROM records WHERE identifier = ?1",
        [record_id],
        record_row,
    )
    .optional()?
    .map(|row| row.decode_record())
    .transpose()
}

fn fetch_relation(conn: &Connection, relation_id: &str) -> Result<Option<DbRelation>> {
    conn.query_row(
        "SELECT from_node, to_node, attributes, metadata FROM relations WHERE identifier = ?1",
        [relation_id],
        relation_row,
    )
    .optional()?
    .map(|row| row.decode())
    .transpose()
}

/// `WHERE` clause narrowing a scan by the indexed metadata columns the
/// filter pins. The full filter still runs on every decoded row.
fn indexed_clause(filter: &Filter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    for (key, column) in schema::INDEXED_METADATA_COLUMNS {
        if let Some(value) = filter.metadata_text(key) {
            values.push(value.to_string());
            clauses.push(format!("{} = ?{}", column, values.len()));
        }
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn query_records(conn: &Connection, filter: &Filter) -> Result<Vec<DbRecord>> {
    let (clause, values) = indexed_clause(filter);
    let sql = format!("SELECT attributes, metadata FROM records{} ORDER BY identifier", clause);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), record_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut records = Vec::new();
    for row in rows {
        let record = row.decode_record()?;
        if filter.matches_record(&record) {
            records.push(record);
        }
    }
    Ok(records)
}

fn query_relations(conn: &Connection, filter: &Filter) -> Result<Vec<DbRelation>> {
    let (clause, values) = indexed_clause(filter);
    let sql = format!(
        "SELECT from_node, to_node, attributes, metadata FROM relations{} ORDER BY identifier",
        clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), relation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut relations = Vec::new();
    for row in rows {
        let relation = row.decode()?;
        if filter.matches_relation(&relation) {
            relations.push(relation);
        }
    }
    Ok(relations)
}
