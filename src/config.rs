use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the config file inside the knowledge directory.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct LoreConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub semantic: SemanticConfig,
    pub sync: SyncConfig,
    pub project: ProjectConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Knowledge directory, relative to the repository root unless absolute.
    pub root: String,
    /// SQLite file name under `cache/`.
    pub db_file: String,
    pub ancestor_depth: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub file_limit: usize,
    pub knowledge_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SemanticConfig {
    pub similarity_floor: f32,
    pub high_confidence: f32,
    pub max_vocabulary: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub remote: String,
    /// Branch to sync; the current branch when unset.
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub author: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: ".lore".into(),
            db_file: "index.db".into(),
            ancestor_depth: 5,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            file_limit: 20,
            knowledge_limit: 50,
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.15,
            high_confidence: 0.6,
            max_vocabulary: 20_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            branch: None,
        }
    }
}

impl LoreConfig {
    /// Load `config.toml` from the given knowledge directory (if present),
    /// then apply env var overrides.
    pub fn load(knowledge_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_from(knowledge_dir.as_ref().join(CONFIG_FILE))
    }

    /// Load from a specific file, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LoreConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (LORE_DIR, LORE_LOG_LEVEL, LORE_AUTHOR, LORE_REMOTE).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LORE_DIR") {
            self.storage.root = val;
        }
        if let Ok(val) = std::env::var("LORE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("LORE_AUTHOR") {
            self.project.author = Some(val);
        }
        if let Ok(val) = std::env::var("LORE_REMOTE") {
            self.sync.remote = val;
        }
    }

    /// Serialize to TOML for writing the initial `config.toml`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Author recorded on new entries: configured value, else `$USER`, else "unknown".
    pub fn author(&self) -> String {
        self.project
            .author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".into())
    }
}

/// Resolve the knowledge directory against a repository root, expanding `~`.
pub fn resolve_root(repo_root: &Path, root: &str) -> PathBuf {
    let expanded = expand_tilde(root);
    if expanded.is_absolute() {
        expanded
    } else {
        repo_root.join(expanded)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
