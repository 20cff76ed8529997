use std::collections::BTreeMap;
use std::path::Path;
use crate::{emit_success, OutputMode};
use owo_colors::OwoColorize;
use provdb::adapter::{save_document, ProvAdapter};
use provdb::config::{self, ProvdbConfig};
use provdb::ui::{self, banner, header, info, section, stats_table, success, summary_row, Icons};
use provdb::{DbDocument, Filter};

fn build_filter(props: &[String], metas: &[String]) -> provdb::Result<Filter> {
    let mut filter = Filter::all();
    for term in props {
        let (key, value) = Filter::parse_property(term)?;
        filter = filter.with_property(key, value);
    }
    for term in metas {
        let (key, value) = Filter::parse_metadata(term)?;
        filter = filter.with_metadata(key, value);
    }
    Ok(filter)
}

pub fn run_init(
    config: &ProvdbConfig,
    config_path: Option<&Path>,
    force: bool,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let path = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    config::write_config(&path, config, force)?;

    if let Some(db_path) = config.database_path() {
        config::ensure_db_dir(&db_path)?;
        config::ensure_gitignore(Path::new("."))?;
    }
    let mut adapter = config::open_adapter(config)?;
    adapter.disconnect();

    if output_mode.is_human() {
        success(&format!("Wrote {}", path.display()));
        info("Backend", config.backend.as_str());
        info("Merge behaviour", config.merge_behaviour.as_str());
        if let Some(db_path) = config.database_path() {
            info("Database", &db_path.display().to_string());
        }
    } else {
        emit_success(output_mode, "init", serde_json::json!({
            "config": path.display().to_string(),
            "backend": config.backend.as_str(),
            "merge_behaviour": config.merge_behaviour.as_str(),
        }))?;
    }
    Ok(())
}

pub fn run_import(adapter: &mut dyn ProvAdapter, file: &Path, output_mode: OutputMode) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)?;
    let document: DbDocument = serde_json::from_str(&contents)?;

    let summary = save_document(adapter, &document)?;

    if output_mode.is_human() {
        success(&format!(
            "Imported {} records and {} relations from {}",
            summary.records,
            summary.relations,
            file.display()
        ));
    } else {
        emit_success(output_mode, "import", serde_json::json!({
            "records": summary.records,
            "relations": summary.relations,
        }))?;
    }
    Ok(())
}

pub fn run_get(adapter: &dyn ProvAdapter, id: &str, relation: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    if relation {
        let relation = adapter.get_relation(id)?;
        if output_mode.is_human() {
            header(&ui::prov_type(relation.identifier(), relation.metadata.prov_type()));
            println!("{}", ui::relation_table(std::slice::from_ref(&relation)));
        } else {
            emit_success(output_mode, "get", serde_json::to_value(&relation)?)?;
        }
    } else {
        let record = adapter.get_record(id)?;
        if output_mode.is_human() {
            header(&ui::prov_type(record.identifier(), record.metadata.prov_type()));
            println!("{}", ui::record_table(std::slice::from_ref(&record)));
            let namespaces = record.metadata.namespaces();
            if !namespaces.is_empty() {
                section("Namespaces");
                for (prefix, uri) in &namespaces {
                    summary_row(prefix, uri);
                }
            }
        } else {
            emit_success(output_mode, "get", serde_json::to_value(&record)?)?;
        }
    }
    Ok(())
}

pub fn run_filter(
    adapter: &dyn ProvAdapter,
    props: &[String],
    metas: &[String],
    relations: bool,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let filter = build_filter(props, metas)?;

    if relations {
        let found = adapter.get_relations_by_filter(&filter)?;
        if output_mode.is_human() {
            println!("{} {} relations", Icons::SEARCH, found.len());
            if !found.is_empty() {
                println!("{}", ui::relation_table(&found));
            }
        } else {
            emit_success(output_mode, "filter", serde_json::to_value(&found)?)?;
        }
    } else {
        let found = adapter.get_records_by_filter(&filter)?;
        if output_mode.is_human() {
            println!("{} {} records", Icons::SEARCH, found.len());
            if !found.is_empty() {
                println!("{}", ui::record_table(&found));
            }
        } else {
            emit_success(output_mode, "filter", serde_json::to_value(&found)?)?;
        }
    }
    Ok(())
}

pub fn run_tail(
    adapter: &dyn ProvAdapter,
    props: &[String],
    metas: &[String],
    depth: Option<usize>,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let filter = build_filter(props, metas)?;
    let tail = adapter.get_records_tail(&filter, depth)?;

    if output_mode.is_human() {
        let depth_label = depth.map_or_else(|| "unbounded".to_string(), |d| d.to_string());
        banner(
            &format!("Tail of {} seed filter terms", props.len() + metas.len()),
            &format!("depth: {}", depth_label),
        );
        section(&format!("{} Records ({})", Icons::NODE, tail.records.len()));
        if !tail.records.is_empty() {
            println!("{}", ui::record_table(&tail.records));
        }
        section(&format!("{} Relations ({})", Icons::LINK, tail.relations.len()));
        if !tail.relations.is_empty() {
            println!("{}", ui::relation_table(&tail.relations));
        }
    } else {
        emit_success(output_mode, "tail", serde_json::to_value(&tail)?)?;
    }
    Ok(())
}

pub fn run_delete(adapter: &mut dyn ProvAdapter, id: &str, relation: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let kind = if relation {
        adapter.delete_relation(id)?;
        "relation"
    } else {
        adapter.delete_record(id)?;
        "record"
    };

    if output_mode.is_human() {
        println!("{} Deleted {} {}", Icons::DEL, kind, id.bold());
    } else {
        emit_success(output_mode, "delete", serde_json::json!({ "kind": kind, "id": id }))?;
    }
    Ok(())
}

pub fn run_delete_by_filter(
    adapter: &mut dyn ProvAdapter,
    props: &[String],
    metas: &[String],
    all: bool,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let filter = build_filter(props, metas)?;
    if filter.is_empty() && !all {
        anyhow::bail!("refusing to delete every record without --all (pass an id or --prop/--meta terms)");
    }

    let deleted = adapter.delete_records_by_filter(&filter)?;

    if output_mode.is_human() {
        println!("{} Deleted {} records", Icons::DEL, deleted);
    } else {
        emit_success(output_mode, "delete", serde_json::json!({ "records": deleted }))?;
    }
    Ok(())
}

pub fn run_export(adapter: &dyn ProvAdapter, output: Option<&Path>, output_mode: OutputMode) -> anyhow::Result<()> {
    let document = adapter.get_document()?;

    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
            if output_mode.is_human() {
                success(&format!(
                    "Exported {} records and {} relations to {}",
                    document.record_count(),
                    document.relation_count(),
                    path.display()
                ));
            } else {
                emit_success(output_mode, "export", serde_json::json!({
                    "path": path.display().to_string(),
                    "records": document.record_count(),
                    "relations": document.relation_count(),
                }))?;
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&document)?),
    }
    Ok(())
}

pub fn run_stats(adapter: &dyn ProvAdapter, config: &ProvdbConfig, output_mode: OutputMode) -> anyhow::Result<()> {
    let document = adapter.get_document()?;

    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let records = std::iter::once(&document.document)
        .chain(document.bundles.values())
        .flat_map(|b| b.bundle_record.iter().chain(b.records.iter()));
    for record in records {
        *by_type.entry(record.metadata.prov_type().to_string()).or_default() += 1;
    }

    if output_mode.is_human() {
        banner(
            &format!("{} provdb statistics", Icons::STATS),
            &format!("{} backend, merge behaviour {}", adapter.name(), adapter.merge_behaviour()),
        );

        let records = document.record_count().to_string();
        let relations = document.relation_count().to_string();
        let bundles = document.bundles.len().to_string();
        println!(
            "{}",
            stats_table(&[
                ("Records", records.as_str()),
                ("Relations", relations.as_str()),
                ("Bundles", bundles.as_str()),
            ])
        );

        if !by_type.is_empty() {
            section("Records by type");
            for (prov_type, count) in &by_type {
                summary_row(prov_type, &count.to_string());
            }
        }
        if let Some(db_path) = config.database_path() {
            println!();
            println!("{}", ui::muted(&format!("{} {}", Icons::DATABASE, db_path.display())));
        }
    } else {
        emit_success(output_mode, "stats", serde_json::json!({
            "backend": adapter.name(),
            "records": document.record_count(),
            "relations": document.relation_count(),
            "bundles": document.bundles.len(),
            "by_type": by_type,
        }))?;
    }
    Ok(())
}
