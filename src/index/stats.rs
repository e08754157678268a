//! Row counts and health diagnostics for the derived index.

use rusqlite::Connection;
use serde::Serialize;

use super::meta;
use super::{IndexResult, SearchIndex};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files: u64,
    pub decisions: u64,
    pub warnings: u64,
    pub features: u64,
    pub code_chunks: u64,
    pub semantic_documents: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub tokenizer_version: Option<String>,
    pub semantic_model_fitted: bool,
    pub stats: IndexStats,
}

impl HealthReport {
    /// Vectors written by another tokenizer are meaningless to this binary.
    /// An index without vectors is not stale.
    pub fn tokenizer_stale(&self) -> bool {
        self.tokenizer_version
            .as_deref()
            .is_some_and(|v| v != meta::TOKENIZER_VERSION)
    }
}

fn count(conn: &Connection, table: &str) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n as u64)
}

fn collect_stats(conn: &Connection) -> rusqlite::Result<IndexStats> {
    Ok(IndexStats {
        files: count(conn, "files")?,
        decisions: count(conn, "decisions")?,
        warnings: count(conn, "warnings")?,
        features: count(conn, "features")?,
        code_chunks: count(conn, "code_chunks")?,
        semantic_documents: count(conn, "semantic_documents")?,
    })
}

impl SearchIndex {
    pub fn stats(&self) -> IndexResult<IndexStats> {
        Ok(collect_stats(&*self.conn()?)?)
    }

    /// Run `PRAGMA integrity_check` and gather version and count information.
    pub fn check_health(&self) -> IndexResult<HealthReport> {
        let conn = self.conn()?;

        let details: Vec<String> = conn
            .prepare("PRAGMA integrity_check")?
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        let integrity_ok = details.len() == 1 && details[0] == "ok";

        let model_rows = count(&conn, "semantic_model")?;

        Ok(HealthReport {
            integrity_ok,
            integrity_details: details.join("; "),
            schema_version: meta::schema_version(&conn)?,
            tokenizer_version: meta::tokenizer_version(&conn)?,
            semantic_model_fitted: model_rows > 0,
            stats: collect_stats(&conn)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{Severity, Warning};

    #[test]
    fn fresh_index_is_healthy_and_empty() {
        let index = SearchIndex::open_in_memory().unwrap();
        let report = index.check_health().unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.schema_version, meta::SCHEMA_VERSION);
        assert!(report.tokenizer_version.is_none());
        assert!(!report.tokenizer_stale());
        assert!(!report.semantic_model_fitted);
        assert_eq!(report.stats, IndexStats::default());
    }

    #[test]
    fn stats_count_rows() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_warning(&Warning {
                id: "w1".into(),
                content: "flaky test".into(),
                reason: String::new(),
                evidence: None,
                severity: Severity::Info,
                author: "tester".into(),
                tags: vec![],
                feature: None,
                created_at: "2026-01-01T00:00:00Z".into(),
            })
            .unwrap();
        let stats = index.stats().unwrap();
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.decisions, 0);
    }

    #[test]
    fn foreign_tokenizer_is_stale() {
        let index = SearchIndex::open_in_memory().unwrap();
        meta::set_tokenizer_version(&index.conn().unwrap(), "other").unwrap();
        assert!(index.check_health().unwrap().tokenizer_stale());
    }
}
