//! Per-entity index writes.
//!
//! Every writer is an upsert keyed on the entity's identity, so indexing the
//! same record twice is harmless and indexing a changed record replaces its
//! row (the update trigger refreshes the FTS entry). Live updates and
//! rebuilds go through these same functions.

use rusqlite::{params, Connection};

use super::{IndexResult, SearchIndex};
use crate::store::types::{CodeChunk, Decision, Feature, FileIndex, Warning};

fn to_json(values: &[String]) -> IndexResult<String> {
    Ok(serde_json::to_string(values)?)
}

pub(crate) fn upsert_file(conn: &Connection, file: &FileIndex) -> IndexResult<()> {
    conn.execute(
        "INSERT INTO files (path, summary, exports, imports, language, patterns, content_hash, indexed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT(path) DO UPDATE SET \
            summary = excluded.summary, exports = excluded.exports, imports = excluded.imports, \
            language = excluded.language, patterns = excluded.patterns, \
            content_hash = excluded.content_hash, indexed_at = excluded.indexed_at",
        params![
            file.path,
            file.summary,
            to_json(&file.exports)?,
            to_json(&file.imports)?,
            file.language,
            to_json(&file.patterns)?,
            file.content_hash,
            file.indexed_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_decision(conn: &Connection, decision: &Decision) -> IndexResult<()> {
    conn.execute(
        "INSERT INTO decisions (id, content, reason, context, alternatives, author, status, tags, feature, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT(id) DO UPDATE SET \
            content = excluded.content, reason = excluded.reason, context = excluded.context, \
            alternatives = excluded.alternatives, author = excluded.author, status = excluded.status, \
            tags = excluded.tags, feature = excluded.feature, created_at = excluded.created_at",
        params![
            decision.id,
            decision.content,
            decision.reason,
            decision.context,
            to_json(&decision.alternatives)?,
            decision.author,
            decision.status.as_str(),
            to_json(&decision.tags)?,
            decision.feature,
            decision.created_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_warning(conn: &Connection, warning: &Warning) -> IndexResult<()> {
    conn.execute(
        "INSERT INTO warnings (id, content, reason, evidence, severity, author, tags, feature, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT(id) DO UPDATE SET \
            content = excluded.content, reason = excluded.reason, evidence = excluded.evidence, \
            severity = excluded.severity, author = excluded.author, tags = excluded.tags, \
            feature = excluded.feature, created_at = excluded.created_at",
        params![
            warning.id,
            warning.content,
            warning.reason,
            warning.evidence,
            warning.severity.as_str(),
            warning.author,
            to_json(&warning.tags)?,
            warning.feature,
            warning.created_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_feature(conn: &Connection, feature: &Feature) -> IndexResult<()> {
    conn.execute(
        "INSERT INTO features (id, status, branch, extends, current_state, relevant_files, owner, created_at, last_accessed, archived_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT(id) DO UPDATE SET \
            status = excluded.status, branch = excluded.branch, extends = excluded.extends, \
            current_state = excluded.current_state, relevant_files = excluded.relevant_files, \
            owner = excluded.owner, created_at = excluded.created_at, \
            last_accessed = excluded.last_accessed, archived_at = excluded.archived_at",
        params![
            feature.id,
            feature.status.as_str(),
            feature.branch,
            feature.extends,
            feature.current_state,
            to_json(&feature.relevant_files)?,
            feature.owner,
            feature.created_at,
            feature.last_accessed,
            feature.archived_at,
        ],
    )?;
    Ok(())
}

/// Whole-file replacement: drop every chunk for `path`, insert the new set.
pub(crate) fn replace_chunks(
    conn: &mut Connection,
    path: &str,
    chunks: &[CodeChunk],
) -> IndexResult<usize> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM code_chunks WHERE path = ?1", params![path])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO code_chunks (path, name, kind, language, start_line, end_line, content) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for chunk in chunks {
            stmt.execute(params![
                path,
                chunk.name,
                chunk.kind,
                chunk.language,
                chunk.start_line,
                chunk.end_line,
                chunk.content,
            ])?;
        }
    }
    tx.commit()?;
    Ok(chunks.len())
}

impl SearchIndex {
    pub fn index_file(&self, file: &FileIndex) -> IndexResult<()> {
        upsert_file(&*self.conn()?, file)
    }

    pub fn index_decision(&self, decision: &Decision) -> IndexResult<()> {
        upsert_decision(&*self.conn()?, decision)
    }

    pub fn index_warning(&self, warning: &Warning) -> IndexResult<()> {
        upsert_warning(&*self.conn()?, warning)
    }

    pub fn index_feature(&self, feature: &Feature) -> IndexResult<()> {
        upsert_feature(&*self.conn()?, feature)
    }

    /// Replace all chunks of one file. Chunks are stored under `path`
    /// regardless of the path each chunk carries.
    pub fn index_code_chunks(&self, path: &str, chunks: &[CodeChunk]) -> IndexResult<usize> {
        let count = replace_chunks(&mut *self.conn()?, path, chunks)?;
        tracing::debug!(path = %path, count, "code chunks indexed");
        Ok(count)
    }

    /// Drop a file and its chunks from the index. Returns `true` if the file
    /// row existed.
    pub fn remove_file(&self, path: &str) -> IndexResult<bool> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM code_chunks WHERE path = ?1", params![path])?;
        let removed = conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{DecisionStatus, FeatureStatus};

    fn decision(id: &str, content: &str) -> Decision {
        Decision {
            id: id.into(),
            content: content.into(),
            reason: String::new(),
            context: None,
            alternatives: vec![],
            author: "tester".into(),
            status: DecisionStatus::Active,
            tags: vec!["auth".into()],
            feature: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn chunk(name: &str) -> CodeChunk {
        CodeChunk {
            path: "src/lib.rs".into(),
            name: name.into(),
            kind: "function".into(),
            language: Some("rust".into()),
            start_line: 1,
            end_line: 10,
            content: format!("fn {name}() {{}}"),
        }
    }

    fn count(index: &SearchIndex, sql: &str) -> i64 {
        index.conn().unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn reindexing_replaces_row_and_fts_entry() {
        let index = SearchIndex::open_in_memory().unwrap();
        index.index_decision(&decision("d1", "use redis")).unwrap();
        index.index_decision(&decision("d1", "use memcached")).unwrap();

        assert_eq!(count(&index, "SELECT COUNT(*) FROM decisions"), 1);
        assert_eq!(
            count(&index, "SELECT COUNT(*) FROM decisions_fts WHERE decisions_fts MATCH 'redis'"),
            0
        );
        assert_eq!(
            count(&index, "SELECT COUNT(*) FROM decisions_fts WHERE decisions_fts MATCH 'memcached'"),
            1
        );
    }

    #[test]
    fn chunks_are_replaced_per_file() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_code_chunks("src/lib.rs", &[chunk("alpha"), chunk("beta")])
            .unwrap();
        index.index_code_chunks("src/other.rs", &[chunk("gamma")]).unwrap();
        index.index_code_chunks("src/lib.rs", &[chunk("delta")]).unwrap();

        assert_eq!(count(&index, "SELECT COUNT(*) FROM code_chunks"), 2);
        assert_eq!(
            count(&index, "SELECT COUNT(*) FROM code_chunks_fts WHERE code_chunks_fts MATCH 'alpha'"),
            0
        );
        assert_eq!(
            count(&index, "SELECT COUNT(*) FROM code_chunks WHERE path = 'src/lib.rs'"),
            1
        );
    }

    #[test]
    fn remove_file_drops_chunks() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_file(&FileIndex {
                path: "src/lib.rs".into(),
                summary: "crate root".into(),
                exports: vec![],
                imports: vec![],
                language: Some("rust".into()),
                patterns: vec![],
                content_hash: "h".into(),
                indexed_at: "2026-01-01T00:00:00Z".into(),
            })
            .unwrap();
        index.index_code_chunks("src/lib.rs", &[chunk("alpha")]).unwrap();

        assert!(index.remove_file("src/lib.rs").unwrap());
        assert!(!index.remove_file("src/lib.rs").unwrap());
        assert_eq!(count(&index, "SELECT COUNT(*) FROM code_chunks"), 0);
    }

    #[test]
    fn feature_status_round_trips() {
        let index = SearchIndex::open_in_memory().unwrap();
        let mut feature = Feature {
            id: "auth".into(),
            status: FeatureStatus::Active,
            branch: None,
            extends: None,
            current_state: String::new(),
            relevant_files: vec![],
            owner: None,
            created_at: "t".into(),
            last_accessed: "t".into(),
            archived_at: None,
        };
        index.index_feature(&feature).unwrap();
        feature.status = FeatureStatus::Archived;
        index.index_feature(&feature).unwrap();
        assert_eq!(
            count(&index, "SELECT COUNT(*) FROM features WHERE status = 'archived'"),
            1
        );
    }
}
