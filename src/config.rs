use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::adapter::{AuthInfo, ProvAdapter};
use crate::merge::MergeBehaviour;
use crate::storage::sqlite::{AUTH_KEY_CREATE, AUTH_KEY_PATH};
use crate::storage::{InMemoryAdapter, SqliteAdapter};

/// Which storage backend a configuration selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl FromStr for BackendKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" | "in-memory" => Ok(BackendKind::Memory),
            "sqlite" | "sqlite3" => Ok(BackendKind::Sqlite),
            _ => Err(crate::Error::InvalidOptions(format!("unknown backend: {}", s))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contents of `provdb.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProvdbConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub merge_behaviour: MergeBehaviour,
    /// Passed verbatim to `connect`
    #[serde(default)]
    pub auth: AuthInfo,
}

impl ProvdbConfig {
    /// SQLite configuration pointing at `db_path`
    pub fn sqlite(db_path: &Path) -> Self {
        Self {
            backend: BackendKind::Sqlite,
            merge_behaviour: MergeBehaviour::default(),
            auth: AuthInfo::from([
                (AUTH_KEY_PATH.to_string(), db_path.display().to_string()),
                (AUTH_KEY_CREATE.to_string(), "true".to_string()),
            ]),
        }
    }

    /// Database file this configuration points at, for the SQLite backend
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.backend {
            BackendKind::Sqlite => self.auth.get(AUTH_KEY_PATH).map(PathBuf::from),
            BackendKind::Memory => None,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("provdb.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".provdb").join("provdb.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ProvdbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ProvdbConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ProvdbConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".provdb/";

    let mut content = if gitignore_path.exists() {
        std::fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };
    if content.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

/// Build the configured backend, apply the merge behaviour and connect
pub fn open_adapter(config: &ProvdbConfig) -> crate::Result<Box<dyn ProvAdapter>> {
    let mut adapter: Box<dyn ProvAdapter> = match config.backend {
        BackendKind::Memory => Box::new(InMemoryAdapter::new()),
        BackendKind::Sqlite => Box::new(SqliteAdapter::new()),
    };

    adapter.set_merge_behaviour(config.merge_behaviour);
    adapter.connect(&config.auth)?;
    tracing::debug!(backend = adapter.name(), merge = %config.merge_behaviour, "opened adapter");
    Ok(adapter)
}
