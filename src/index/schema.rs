//! SQL DDL for the derived search index.
//!
//! Base tables mirror canonical records; each searchable table has an FTS5
//! external-content twin kept in step by insert/delete/update triggers.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// Every table the index owns, in the order rebuild clears them.
pub const DERIVED_TABLES: &[&str] = &[
    "files",
    "decisions",
    "warnings",
    "features",
    "code_chunks",
    "semantic_documents",
    "semantic_model",
];

const SCHEMA_SQL: &str = r#"
-- Files produced by the scanner
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    summary TEXT NOT NULL DEFAULT '',
    exports TEXT NOT NULL DEFAULT '[]',
    imports TEXT NOT NULL DEFAULT '[]',
    language TEXT,
    patterns TEXT NOT NULL DEFAULT '[]',
    content_hash TEXT NOT NULL DEFAULT '',
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_language ON files(language);

CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts5(
    path,
    summary,
    exports,
    patterns,
    content='files',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS files_ai AFTER INSERT ON files BEGIN
    INSERT INTO files_fts (rowid, path, summary, exports, patterns)
    VALUES (new.rowid, new.path, new.summary, new.exports, new.patterns);
END;

CREATE TRIGGER IF NOT EXISTS files_ad AFTER DELETE ON files BEGIN
    INSERT INTO files_fts (files_fts, rowid, path, summary, exports, patterns)
    VALUES ('delete', old.rowid, old.path, old.summary, old.exports, old.patterns);
END;

CREATE TRIGGER IF NOT EXISTS files_au AFTER UPDATE ON files BEGIN
    INSERT INTO files_fts (files_fts, rowid, path, summary, exports, patterns)
    VALUES ('delete', old.rowid, old.path, old.summary, old.exports, old.patterns);
    INSERT INTO files_fts (rowid, path, summary, exports, patterns)
    VALUES (new.rowid, new.path, new.summary, new.exports, new.patterns);
END;

-- Decisions
CREATE TABLE IF NOT EXISTS decisions (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    reason TEXT NOT NULL DEFAULT '',
    context TEXT,
    alternatives TEXT NOT NULL DEFAULT '[]',
    author TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','superseded')),
    tags TEXT NOT NULL DEFAULT '[]',
    feature TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_decisions_feature ON decisions(feature);
CREATE INDEX IF NOT EXISTS idx_decisions_status ON decisions(status);
CREATE INDEX IF NOT EXISTS idx_decisions_created ON decisions(created_at);

CREATE VIRTUAL TABLE IF NOT EXISTS decisions_fts USING fts5(
    content,
    reason,
    context,
    tags,
    content='decisions',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS decisions_ai AFTER INSERT ON decisions BEGIN
    INSERT INTO decisions_fts (rowid, content, reason, context, tags)
    VALUES (new.rowid, new.content, new.reason, new.context, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS decisions_ad AFTER DELETE ON decisions BEGIN
    INSERT INTO decisions_fts (decisions_fts, rowid, content, reason, context, tags)
    VALUES ('delete', old.rowid, old.content, old.reason, old.context, old.tags);
END;

CREATE TRIGGER IF NOT EXISTS decisions_au AFTER UPDATE ON decisions BEGIN
    INSERT INTO decisions_fts (decisions_fts, rowid, content, reason, context, tags)
    VALUES ('delete', old.rowid, old.content, old.reason, old.context, old.tags);
    INSERT INTO decisions_fts (rowid, content, reason, context, tags)
    VALUES (new.rowid, new.content, new.reason, new.context, new.tags);
END;

-- Warnings
CREATE TABLE IF NOT EXISTS warnings (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    reason TEXT NOT NULL DEFAULT '',
    evidence TEXT,
    severity TEXT NOT NULL DEFAULT 'warning' CHECK(severity IN ('info','warning','critical')),
    author TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    feature TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_warnings_feature ON warnings(feature);
CREATE INDEX IF NOT EXISTS idx_warnings_severity ON warnings(severity);
CREATE INDEX IF NOT EXISTS idx_warnings_created ON warnings(created_at);

CREATE VIRTUAL TABLE IF NOT EXISTS warnings_fts USING fts5(
    content,
    reason,
    evidence,
    tags,
    content='warnings',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS warnings_ai AFTER INSERT ON warnings BEGIN
    INSERT INTO warnings_fts (rowid, content, reason, evidence, tags)
    VALUES (new.rowid, new.content, new.reason, new.evidence, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS warnings_ad AFTER DELETE ON warnings BEGIN
    INSERT INTO warnings_fts (warnings_fts, rowid, content, reason, evidence, tags)
    VALUES ('delete', old.rowid, old.content, old.reason, old.evidence, old.tags);
END;

CREATE TRIGGER IF NOT EXISTS warnings_au AFTER UPDATE ON warnings BEGIN
    INSERT INTO warnings_fts (warnings_fts, rowid, content, reason, evidence, tags)
    VALUES ('delete', old.rowid, old.content, old.reason, old.evidence, old.tags);
    INSERT INTO warnings_fts (rowid, content, reason, evidence, tags)
    VALUES (new.rowid, new.content, new.reason, new.evidence, new.tags);
END;

-- Features (structured filters only, no FTS)
CREATE TABLE IF NOT EXISTS features (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL CHECK(status IN ('active','archived')),
    branch TEXT,
    extends TEXT,
    current_state TEXT NOT NULL DEFAULT '',
    relevant_files TEXT NOT NULL DEFAULT '[]',
    owner TEXT,
    created_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    archived_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_features_status ON features(status);

-- Sub-file code chunks
CREATE TABLE IF NOT EXISTS code_chunks (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    language TEXT,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_code_chunks_path ON code_chunks(path);

CREATE VIRTUAL TABLE IF NOT EXISTS code_chunks_fts USING fts5(
    name,
    content,
    path,
    content='code_chunks',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS code_chunks_ai AFTER INSERT ON code_chunks BEGIN
    INSERT INTO code_chunks_fts (rowid, name, content, path)
    VALUES (new.id, new.name, new.content, new.path);
END;

CREATE TRIGGER IF NOT EXISTS code_chunks_ad AFTER DELETE ON code_chunks BEGIN
    INSERT INTO code_chunks_fts (code_chunks_fts, rowid, name, content, path)
    VALUES ('delete', old.id, old.name, old.content, old.path);
END;

CREATE TRIGGER IF NOT EXISTS code_chunks_au AFTER UPDATE ON code_chunks BEGIN
    INSERT INTO code_chunks_fts (code_chunks_fts, rowid, name, content, path)
    VALUES ('delete', old.id, old.name, old.content, old.path);
    INSERT INTO code_chunks_fts (rowid, name, content, path)
    VALUES (new.id, new.name, new.content, new.path);
END;

-- Semantic search: per-document packed TF-IDF vectors
CREATE TABLE IF NOT EXISTS semantic_documents (
    id TEXT PRIMARY KEY,
    doc_type TEXT NOT NULL,
    content TEXT NOT NULL,
    vector BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_semantic_documents_type ON semantic_documents(doc_type);

-- Semantic search: the single fitted model
CREATE TABLE IF NOT EXISTS semantic_model (
    id INTEGER PRIMARY KEY CHECK(id = 1),
    vocabulary TEXT NOT NULL,
    idf BLOB NOT NULL,
    doc_count INTEGER NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    super::meta::stamp_schema_version(conn)
}
