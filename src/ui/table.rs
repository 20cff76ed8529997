use tabled::{settings::Style, Table, Tabled};
use crate::record::{DbRecord, DbRelation};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct RecordRow {
    #[tabled(rename = "Identifier")]
    pub identifier: String,
    #[tabled(rename = "Type")]
    pub prov_type: String,
    #[tabled(rename = "Bundle")]
    pub parent_id: String,
    #[tabled(rename = "Attributes")]
    pub attributes: String,
}

impl From<&DbRecord> for RecordRow {
    fn from(record: &DbRecord) -> Self {
        Self {
            identifier: record.identifier().to_string(),
            prov_type: record.metadata.prov_type().to_string(),
            parent_id: record.metadata.parent_id().to_string(),
            attributes: attribute_summary(record.attributes.iter()),
        }
    }
}

#[derive(Tabled)]
pub struct RelationRow {
    #[tabled(rename = "Identifier")]
    pub identifier: String,
    #[tabled(rename = "Type")]
    pub prov_type: String,
    #[tabled(rename = "From")]
    pub from_node: String,
    #[tabled(rename = "To")]
    pub to_node: String,
    #[tabled(rename = "Attributes")]
    pub attributes: String,
}

impl From<&DbRelation> for RelationRow {
    fn from(relation: &DbRelation) -> Self {
        Self {
            identifier: relation.identifier().to_string(),
            prov_type: relation.metadata.prov_type().to_string(),
            from_node: relation.from_node.clone(),
            to_node: relation.to_node.clone(),
            attributes: attribute_summary(relation.attributes.iter()),
        }
    }
}

fn attribute_summary<'a>(
    pairs: impl Iterator<Item = (&'a str, &'a crate::value::AttributeValue)>,
) -> String {
    pairs
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        render(&self.rows)
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

pub fn record_table(records: &[DbRecord]) -> String {
    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
    render(&rows)
}

pub fn relation_table(relations: &[DbRelation]) -> String {
    let rows: Vec<RelationRow> = relations.iter().map(RelationRow::from).collect();
    render(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use crate::value::Attributes;

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(record_table(&[]).is_empty());
        assert!(stats_table(&[]).is_empty());
    }

    #[test]
    fn test_record_table_lists_attributes() {
        let record = DbRecord::new(
            Attributes::new().with("ex:title", "report").with("ex:pages", 12i64),
            Metadata::new("prov:Entity", "ex:report"),
        );
        let table = record_table(&[record]);
        assert!(table.contains("ex:report"));
        assert!(table.contains("prov:Entity"));
        assert!(table.contains("ex:pages=12"));
    }

    #[test]
    fn test_relation_table_shows_endpoints() {
        let relation = DbRelation::new("ex:report", "ex:bob", Attributes::new(), Metadata::new("prov:Attribution", "ex:attr"));
        let table = relation_table(&[relation]);
        assert!(table.contains("ex:bob"));
        assert!(table.contains("prov:Attribution"));
    }
}
