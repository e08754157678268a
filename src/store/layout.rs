//! On-disk layout of a knowledge directory.
//!
//! ```text
//! <root>/config.toml
//! <root>/knowledge/{decisions,warnings,insights,patterns,graph,evolution,project}.json
//! <root>/index/{files,architecture,api}.json
//! <root>/features/<id>/meta.json, conversations/<conv-id>.json
//! <root>/archive/<id>/…
//! <root>/cache/            derived, never synced
//! ```

use std::path::{Path, PathBuf};

pub const KNOWLEDGE_DIR: &str = "knowledge";
pub const INDEX_DIR: &str = "index";
pub const FEATURES_DIR: &str = "features";
pub const ARCHIVE_DIR: &str = "archive";
pub const CACHE_DIR: &str = "cache";
pub const CONVERSATIONS_DIR: &str = "conversations";
pub const FEATURE_META: &str = "meta.json";

/// Collection files under `knowledge/` that only ever grow.
pub const APPEND_ONLY_COLLECTIONS: &[&str] = &[
    "decisions.json",
    "warnings.json",
    "insights.json",
    "patterns.json",
    "graph.json",
    "evolution.json",
];

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> PathBuf {
        self.root.join(crate::config::CONFIG_FILE)
    }

    pub fn gitignore(&self) -> PathBuf {
        self.root.join(".gitignore")
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.root.join(KNOWLEDGE_DIR)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    pub fn features_dir(&self) -> PathBuf {
        self.root.join(FEATURES_DIR)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn database(&self, db_file: &str) -> PathBuf {
        self.cache_dir().join(db_file)
    }

    pub fn decisions(&self) -> PathBuf {
        self.knowledge_dir().join("decisions.json")
    }

    pub fn warnings(&self) -> PathBuf {
        self.knowledge_dir().join("warnings.json")
    }

    pub fn insights(&self) -> PathBuf {
        self.knowledge_dir().join("insights.json")
    }

    pub fn patterns(&self) -> PathBuf {
        self.knowledge_dir().join("patterns.json")
    }

    pub fn graph(&self) -> PathBuf {
        self.knowledge_dir().join("graph.json")
    }

    pub fn evolution(&self) -> PathBuf {
        self.knowledge_dir().join("evolution.json")
    }

    pub fn project(&self) -> PathBuf {
        self.knowledge_dir().join("project.json")
    }

    pub fn files(&self) -> PathBuf {
        self.index_dir().join("files.json")
    }

    pub fn architecture(&self) -> PathBuf {
        self.index_dir().join("architecture.json")
    }

    pub fn api_surface(&self) -> PathBuf {
        self.index_dir().join("api.json")
    }

    pub fn feature_dir(&self, id: &str) -> PathBuf {
        self.features_dir().join(id)
    }

    pub fn archived_feature_dir(&self, id: &str) -> PathBuf {
        self.archive_dir().join(id)
    }

    /// Directories every initialized knowledge root carries.
    pub fn skeleton(&self) -> [PathBuf; 5] {
        [
            self.knowledge_dir(),
            self.index_dir(),
            self.features_dir(),
            self.archive_dir(),
            self.cache_dir(),
        ]
    }
}

pub fn meta_path(feature_dir: &Path) -> PathBuf {
    feature_dir.join(FEATURE_META)
}

pub fn conversations_dir(feature_dir: &Path) -> PathBuf {
    feature_dir.join(CONVERSATIONS_DIR)
}
