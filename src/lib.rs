//! Persistent project knowledge for a source repository.
//!
//! Lore records the decisions, warnings, insights and patterns behind a
//! codebase, the features being worked on and the conversations about them,
//! and a graph linking all of it to files. Everything lives in a `.lore/`
//! directory committed alongside the code:
//!
//! | Layer | Role | Storage |
//! |-------|------|---------|
//! | **Canonical store** | Source of truth | Pretty-printed JSON, replaced atomically |
//! | **Search index** | Keyword and filtered queries | SQLite + FTS5 under `cache/` |
//! | **Semantic engine** | Similarity search without a model download | TF-IDF vectors in the same database |
//! | **Sync** | Sharing through git | `git` subprocesses scoped to the knowledge subtree |
//!
//! The index is derived: it is never synced and can always be regenerated
//! from the store with [`index::SearchIndex::rebuild`].
//!
//! # Modules
//!
//! - [`config`]: configuration from `config.toml` and environment variables
//! - [`store`]: the canonical JSON store, feature lifecycle and knowledge graph
//! - [`index`]: SQLite schema, writes, searches, rebuild and health checks
//! - [`semantic`]: tokenizer, TF-IDF model and similarity search
//! - [`sync`]: pull, auto-resolve and push of the knowledge directory

pub mod config;
pub mod error;
pub mod index;
pub mod semantic;
pub mod store;
pub mod sync;
