pub mod doctor;
pub mod init;
pub mod rebuild;
pub mod search;
pub mod stats;
pub mod sync;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use lore::config::{self, LoreConfig, StorageConfig};
use lore::index::SearchIndex;
use lore::store::layout::Layout;
use lore::store::KnowledgeStore;

/// The repository, knowledge directory and configuration one command runs against.
pub struct Workspace {
    pub repo_root: PathBuf,
    pub root: PathBuf,
    pub config: LoreConfig,
}

impl Workspace {
    /// Resolve the knowledge directory from `--dir`, then `$LORE_DIR`, then
    /// the default, and load its `config.toml`.
    pub fn locate(repo_root: &Path, dir: Option<&str>) -> Result<Self> {
        let dir = dir
            .map(String::from)
            .or_else(|| std::env::var("LORE_DIR").ok())
            .unwrap_or_else(|| StorageConfig::default().root);
        let root = config::resolve_root(repo_root, &dir);
        let config = LoreConfig::load(&root)
            .with_context(|| format!("failed to load config from {}", root.display()))?;

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            root,
            config,
        })
    }

    pub fn store(&self) -> KnowledgeStore {
        KnowledgeStore::open(&self.root).with_author(self.config.author())
    }

    /// Fails if `lore init` has not been run for this directory.
    pub fn initialized_store(&self) -> Result<KnowledgeStore> {
        let store = self.store();
        anyhow::ensure!(
            store.is_initialized(),
            "no knowledge directory at {}; run `lore init` first",
            self.root.display()
        );
        Ok(store)
    }

    pub fn index_path(&self) -> PathBuf {
        Layout::new(&self.root).database(&self.config.storage.db_file)
    }

    pub fn open_index(&self) -> Result<SearchIndex> {
        let path = self.index_path();
        SearchIndex::open(&path)
            .with_context(|| format!("failed to open search index at {}", path.display()))
    }
}

/// Shorten `text` to `max` characters for one-line listings.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("first\nsecond", 20), "first");
    }
}
