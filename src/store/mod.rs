//! Canonical store: the authoritative, git-friendly record of all knowledge.
//!
//! Every collection is one JSON document, replaced wholesale on each write
//! (see [`atomic`]). A single [`RwLock`] per store instance serializes all
//! collection access across every entity type: reads share it, writes
//! (including the read-modify-write of an append) hold it exclusively.
//! Across processes only the atomic rename protects readers; two processes
//! appending to the same collection can lose one update.

pub mod atomic;
pub mod features;
pub mod files;
pub mod graph;
pub mod knowledge;
pub mod layout;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::LoreConfig;
use crate::error::{StoreError, StoreResult};
use layout::Layout;
use types::{Conversation, Decision, Feature, FileIndex, Insight, Pattern, Warning};

/// A collection read record by record: everything that decoded, plus one
/// line per record that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct Salvaged<T> {
    pub items: Vec<T>,
    pub skipped: Vec<String>,
}

impl<T> Default for Salvaged<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Salvaged<T> {
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            skipped: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.skipped.is_empty()
    }

    pub fn append(&mut self, other: Salvaged<T>) {
        self.items.extend(other.items);
        self.skipped.extend(other.skipped);
    }
}

/// The read-only capability set derived indexes are built from.
///
/// Derived indexes consume the canonical store through this trait and never
/// write back to it. A malformed record is reported in
/// [`Salvaged::skipped`] without hiding its well-formed siblings; an `Err`
/// means the collection could not be read at all.
pub trait KnowledgeSource {
    fn decisions(&self) -> StoreResult<Salvaged<Decision>>;
    fn warnings(&self) -> StoreResult<Salvaged<Warning>>;
    fn insights(&self) -> StoreResult<Salvaged<Insight>>;
    fn patterns(&self) -> StoreResult<Salvaged<Pattern>>;
    /// Active and archived features, active first.
    fn all_features(&self) -> StoreResult<Salvaged<Feature>>;
    fn file_indexes(&self) -> StoreResult<Salvaged<FileIndex>>;
    /// Conversations of every feature, active and archived.
    fn all_conversations(&self) -> StoreResult<Salvaged<Conversation>>;
}

pub struct KnowledgeStore {
    layout: Layout,
    author: String,
    lock: RwLock<()>,
}

impl KnowledgeStore {
    /// Bind to an existing (or not yet populated) knowledge directory.
    /// Missing collection files read as empty.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::new(root),
            author: "unknown".into(),
            lock: RwLock::new(()),
        }
    }

    /// Create the directory skeleton, a default `config.toml`, and a
    /// `.gitignore` that keeps `cache/` out of version control.
    /// Existing files are left untouched.
    pub fn init(root: impl Into<PathBuf>, config: &LoreConfig) -> StoreResult<Self> {
        let store = Self::open(root).with_author(config.author());
        for dir in store.layout.skeleton() {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }

        let config_path = store.layout.config();
        if !config_path.exists() {
            let contents = config
                .to_toml()
                .map_err(|e| StoreError::Config(e.to_string()))?;
            fs::write(&config_path, contents).map_err(|e| StoreError::io(&config_path, e))?;
        }

        let gitignore = store.layout.gitignore();
        if !gitignore.exists() {
            let contents = format!("{}/\n*{}\n", layout::CACHE_DIR, atomic::TEMP_SUFFIX);
            fs::write(&gitignore, contents).map_err(|e| StoreError::io(&gitignore, e))?;
        }

        tracing::info!(root = %store.root().display(), "knowledge directory initialized");
        Ok(store)
    }

    /// Default author recorded on entries that don't name one.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_initialized(&self) -> bool {
        self.layout.knowledge_dir().is_dir()
    }

    pub(crate) fn author_or_default(&self, author: Option<String>) -> String {
        author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| self.author.clone())
    }

    pub(crate) fn read_guard(&self) -> StoreResult<RwLockReadGuard<'_, ()>> {
        self.lock.read().map_err(|_| StoreError::LockPoisoned)
    }

    pub(crate) fn write_guard(&self) -> StoreResult<RwLockWriteGuard<'_, ()>> {
        self.lock.write().map_err(|_| StoreError::LockPoisoned)
    }
}

/// `<prefix>-<YYYYMMDD>-<8 hex chars>`
pub fn new_id(prefix: &str) -> String {
    let date = chrono::Utc::now().format("%Y%m%d");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{date}-{}", &suffix[..8])
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl KnowledgeSource for KnowledgeStore {
    fn decisions(&self) -> StoreResult<Salvaged<Decision>> {
        let _guard = self.read_guard()?;
        atomic::read_json_records(&self.layout.decisions())
    }

    fn warnings(&self) -> StoreResult<Salvaged<Warning>> {
        let _guard = self.read_guard()?;
        atomic::read_json_records(&self.layout.warnings())
    }

    fn insights(&self) -> StoreResult<Salvaged<Insight>> {
        let _guard = self.read_guard()?;
        atomic::read_json_records(&self.layout.insights())
    }

    fn patterns(&self) -> StoreResult<Salvaged<Pattern>> {
        let _guard = self.read_guard()?;
        atomic::read_json_records(&self.layout.patterns())
    }

    fn all_features(&self) -> StoreResult<Salvaged<Feature>> {
        self.salvage_features()
    }

    fn file_indexes(&self) -> StoreResult<Salvaged<FileIndex>> {
        let _guard = self.read_guard()?;
        atomic::read_json_records(&self.layout.files())
    }

    fn all_conversations(&self) -> StoreResult<Salvaged<Conversation>> {
        self.salvage_conversations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ids_carry_prefix_and_date() {
        let id = new_id("dec");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "dec");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert_ne!(new_id("dec"), new_id("dec"));
    }

    #[test]
    fn init_creates_skeleton_and_ignores_cache() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".lore");
        let store = KnowledgeStore::init(&root, &LoreConfig::default()).unwrap();

        assert!(store.is_initialized());
        for dir in store.layout().skeleton() {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
        let gitignore = fs::read_to_string(root.join(".gitignore")).unwrap();
        assert!(gitignore.contains("cache/"));
        assert!(root.join("config.toml").exists());
    }

    #[test]
    fn init_keeps_existing_config() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".lore");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("config.toml"), "[logging]\nlevel = \"debug\"\n").unwrap();

        KnowledgeStore::init(&root, &LoreConfig::default()).unwrap();
        let contents = fs::read_to_string(root.join("config.toml")).unwrap();
        assert!(contents.contains("debug"));
    }

    #[test]
    fn uninitialized_store_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(tmp.path().join("nowhere"));
        assert!(!store.is_initialized());
        assert!(store.decisions().unwrap().is_empty());
        assert!(store.features().unwrap().is_empty());
        assert!(KnowledgeSource::all_conversations(&store).unwrap().is_empty());
    }

    #[test]
    fn source_skips_bad_records_and_bad_features() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::init(tmp.path().join(".lore"), &LoreConfig::default()).unwrap();
        store
            .add_decision(types::NewDecision {
                content: "Use JWT".into(),
                ..Default::default()
            })
            .unwrap();
        let mut decisions: Vec<serde_json::Value> =
            atomic::read_json(&store.layout().decisions()).unwrap();
        decisions.push(serde_json::json!({"id": "dec-bad", "content": "no timestamp"}));
        atomic::write_json(&store.layout().decisions(), &decisions).unwrap();

        store
            .create_feature(types::NewFeature {
                id: "good".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .create_feature(types::NewFeature {
                id: "broken".into(),
                ..Default::default()
            })
            .unwrap();
        fs::write(layout::meta_path(&store.layout().feature_dir("broken")), "{").unwrap();

        let salvaged = KnowledgeSource::decisions(&store).unwrap();
        assert_eq!(salvaged.items.len(), 1);
        assert_eq!(salvaged.skipped.len(), 1);
        assert!(salvaged.skipped[0].contains("dec-bad"));
        assert!(store.decisions().is_err());

        let features = KnowledgeSource::all_features(&store).unwrap();
        let ids: Vec<&str> = features.items.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);
        assert_eq!(features.skipped.len(), 1);
        assert!(store.features().is_err());
    }
}
