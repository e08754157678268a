//! Derived search index over the canonical store.
//!
//! Everything here can be deleted and regenerated with [`SearchIndex::rebuild`].
//! One [`rusqlite::Connection`] per process, behind a mutex: index operations
//! are serialized even though SQLite would allow concurrent readers.

pub mod meta;
pub mod rebuild;
pub mod schema;
pub mod search;
pub mod stats;
pub mod write;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::store::KnowledgeSource;

pub use rebuild::RebuildReport;
pub use search::{DecisionFilter, FileFilter, WarningFilter};
pub use stats::{HealthReport, IndexStats};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode index row: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to read canonical store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to prepare index location {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index schema v{found} is not supported (expected v{expected}); delete the index file and rebuild")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("semantic model has not been fitted; run a rebuild first")]
    ModelNotFitted,

    #[error("index connection lock poisoned")]
    LockPoisoned,
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// A cache that can be thrown away and regenerated from the canonical store.
pub trait DerivedIndex {
    /// Drop every derived row.
    fn clear(&self) -> IndexResult<()>;

    /// Clear, then repopulate from `source`. Bad records are skipped and
    /// reported rather than aborting the rebuild.
    fn rebuild_from(&self, source: &dyn KnowledgeSource) -> IndexResult<RebuildReport>;
}

pub struct SearchIndex {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SearchIndex {
    /// Open (or create) the index database at the given path. An existing
    /// database must carry the current schema version.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| IndexError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;

        schema::init_schema(&conn)?;
        meta::ensure_schema_version(&conn)?;

        tracing::info!(path = %path.display(), "search index opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory index (tests, dry runs).
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Location on disk, `None` for in-memory indexes.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::LockPoisoned)
    }
}

impl DerivedIndex for SearchIndex {
    fn clear(&self) -> IndexResult<()> {
        let conn = self.conn()?;
        rebuild::clear_tables(&conn, rebuild::STRUCTURED_TABLES)
    }

    fn rebuild_from(&self, source: &dyn KnowledgeSource) -> IndexResult<RebuildReport> {
        self.rebuild(source)
    }
}
