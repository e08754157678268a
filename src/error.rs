//! Error taxonomy for the canonical store.
//!
//! Missing collection files are not errors (readers see an empty collection);
//! everything else that can go wrong on disk surfaces as a [`StoreError`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("feature already exists: {0}")]
    FeatureExists(String),

    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    #[error("feature is already archived: {0}")]
    AlreadyArchived(String),

    #[error("feature is not archived: {0}")]
    NotArchived(String),

    #[error("feature is archived and read-only: {0}")]
    FeatureArchived(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FeatureNotFound(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
