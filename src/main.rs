//! provdb CLI - inspect and manage PROV graphs stored through provdb adapters

mod commands;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use provdb::config::{self, BackendKind, ProvdbConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "provdb")]
#[command(version)]
#[command(about = "Store, query and traverse W3C PROV provenance graphs")]
#[command(long_about = r#"
provdb persists PROV records and relations through a pluggable adapter
(in-memory or SQLite) and lets you:
  • Import and export whole documents as JSON
  • Look up records and relations by identifier or by filter
  • Walk the provenance "tail" reachable from a set of records

Example usage:
  provdb init
  provdb import --file report.json
  provdb filter --meta prov_type=prov:Entity
  provdb tail --meta identifier=ex:report --depth 2
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./provdb.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database to use instead of the configured backend
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Merge behaviour for saves: no_merge, soft or override
    #[arg(short, long, global = true)]
    merge: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Repeatable `key=value` filter terms
#[derive(clap::Args, Debug, Default)]
struct FilterArgs {
    /// Attribute term, `key=value` or `key=value^^xsd:long`
    #[arg(short, long = "prop")]
    props: Vec<String>,

    /// Metadata term, e.g. `prov_type=prov:Entity`
    #[arg(long = "meta")]
    metas: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a provdb.toml and create the database
    Init {
        /// Backend to configure: memory or sqlite
        #[arg(short, long, default_value = "sqlite")]
        backend: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Import a JSON document (as produced by `export`)
    Import {
        /// Path to the document file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Fetch one record (or relation) by identifier
    Get {
        /// Identifier to look up
        id: String,

        /// Look up a relation instead of a record
        #[arg(short, long)]
        relation: bool,
    },

    /// List records (or relations) matching a filter
    Filter {
        #[command(flatten)]
        filter: FilterArgs,

        /// Match relations instead of records
        #[arg(short, long)]
        relations: bool,
    },

    /// Collect everything reachable from the records matching a filter
    Tail {
        #[command(flatten)]
        filter: FilterArgs,

        /// Maximum number of hops (unbounded if omitted)
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Delete a record or relation by identifier, or records by filter
    Delete {
        /// Identifier to delete
        id: Option<String>,

        /// Delete a relation instead of a record
        #[arg(short, long)]
        relation: bool,

        #[command(flatten)]
        filter: FilterArgs,

        /// Allow an empty filter to delete every record
        #[arg(long)]
        all: bool,
    },

    /// Export the whole store as a JSON document
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show store statistics
    Stats,
}

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

/// Print a successful result envelope in JSON mode
pub fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn emit_error(mode: OutputMode, err: &anyhow::Error) {
    match mode {
        OutputMode::Json => {
            let envelope = serde_json::json!({
                "ok": false,
                "error": format!("{:#}", err),
            });
            println!("{}", envelope);
        }
        OutputMode::Human => provdb::ui::error(&format!("{:#}", err)),
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    if let Err(err) = run(cli, mode) {
        emit_error(mode, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, mode: OutputMode) -> anyhow::Result<()> {
    if let Commands::Init { backend, force } = &cli.command {
        return commands::run_init(&init_config(&cli, backend)?, cli.config.as_deref(), *force, mode);
    }

    let config = resolve_config(&cli)?;
    if let Some(db_path) = config.database_path() {
        config::ensure_db_dir(&db_path)?;
    }
    let mut adapter = config::open_adapter(&config)?;

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Import { file } => commands::run_import(&mut *adapter, &file, mode),
        Commands::Get { id, relation } => commands::run_get(&*adapter, &id, relation, mode),
        Commands::Filter { filter, relations } => {
            commands::run_filter(&*adapter, &filter.props, &filter.metas, relations, mode)
        }
        Commands::Tail { filter, depth } => {
            commands::run_tail(&*adapter, &filter.props, &filter.metas, depth, mode)
        }
        Commands::Delete { id, relation, filter, all } => match id {
            Some(id) => commands::run_delete(&mut *adapter, &id, relation, mode),
            None => commands::run_delete_by_filter(&mut *adapter, &filter.props, &filter.metas, all, mode),
        },
        Commands::Export { output } => commands::run_export(&*adapter, output.as_deref(), mode),
        Commands::Stats => commands::run_stats(&*adapter, &config, mode),
    };

    adapter.disconnect();
    result
}

/// Configuration for every command but `init`: `--database` wins over the
/// config file, which wins over the default `.provdb/provdb.db`.
fn resolve_config(cli: &Cli) -> anyhow::Result<ProvdbConfig> {
    let mut config = match &cli.database {
        Some(db_path) => ProvdbConfig::sqlite(db_path),
        None => match config::load_config(cli.config.as_deref())? {
            Some(config) => config,
            None => ProvdbConfig::sqlite(&config::default_database_path_in(Path::new("."))),
        },
    };

    if let Some(merge) = &cli.merge {
        config.merge_behaviour = merge.parse()?;
    }
    Ok(config)
}

fn init_config(cli: &Cli, backend: &str) -> anyhow::Result<ProvdbConfig> {
    let mut config = match backend.parse::<BackendKind>()? {
        BackendKind::Sqlite => {
            let db_path = cli
                .database
                .clone()
                .unwrap_or_else(|| config::default_database_path_in(Path::new(".")));
            ProvdbConfig::sqlite(&db_path)
        }
        BackendKind::Memory => ProvdbConfig {
            backend: BackendKind::Memory,
            ..ProvdbConfig::default()
        },
    };

    if let Some(merge) = &cli.merge {
        config.merge_behaviour = merge.parse()?;
    }
    Ok(config)
}
