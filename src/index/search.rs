//! Full-text and structured queries over the derived index.
//!
//! Free text goes through FTS5; structured filters are plain column
//! equalities. Both are AND-combined, newest first, capped at a limit.

use rusqlite::types::Type;
use rusqlite::{params_from_iter, Row};
use std::str::FromStr;

use super::{IndexResult, SearchIndex};
use crate::store::types::{
    CodeChunk, Decision, DecisionStatus, Feature, FeatureStatus, FileIndex, Severity, Warning,
};

pub const DEFAULT_FILE_LIMIT: usize = 20;
pub const DEFAULT_KNOWLEDGE_LIMIT: usize = 50;
pub const DEFAULT_CHUNK_LIMIT: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionFilter {
    pub feature: Option<String>,
    pub status: Option<DecisionStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct WarningFilter {
    pub feature: Option<String>,
    pub severity: Option<Severity>,
}

/// Translate user query text into an FTS5 MATCH expression.
///
/// Bare words become quoted terms (implicit AND), `term*` stays a prefix
/// query, and upper-case `AND`/`OR`/`NOT` pass through as operators.
/// Operators that would leave the expression dangling are dropped.
/// Returns `None` when nothing searchable remains.
pub fn build_match_query(query: &str) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;

    for word in query.split_whitespace() {
        if matches!(word, "AND" | "OR" | "NOT") {
            if !parts.is_empty() {
                pending_op = Some(word);
            }
            continue;
        }

        let (stem, prefix) = match word.strip_suffix('*') {
            Some(stem) => (stem, true),
            None => (word, false),
        };
        let clean = stem.replace('"', "");
        if clean.is_empty() {
            continue;
        }

        if let Some(op) = pending_op.take() {
            parts.push(op.to_string());
        }
        if prefix {
            parts.push(format!("\"{clean}\"*"));
        } else {
            parts.push(format!("\"{clean}\""));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Empty strings count as "no filter".
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accumulates WHERE clauses and their positional parameters.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Conditions {
    fn push(&mut self, clause: &str, value: impl Into<String>) {
        self.params.push(value.into());
        self.clauses
            .push(clause.replace('?', &format!("?{}", self.params.len())));
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// A string-enum column; unknown values are conversion errors.
fn enum_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileIndex> {
    Ok(FileIndex {
        path: row.get(0)?,
        summary: row.get(1)?,
        exports: json_list(row, 2)?,
        imports: json_list(row, 3)?,
        language: row.get(4)?,
        patterns: json_list(row, 5)?,
        content_hash: row.get(6)?,
        indexed_at: row.get(7)?,
    })
}

fn decision_from_row(row: &Row<'_>) -> rusqlite::Result<Decision> {
    Ok(Decision {
        id: row.get(0)?,
        content: row.get(1)?,
        reason: row.get(2)?,
        context: row.get(3)?,
        alternatives: json_list(row, 4)?,
        author: row.get(5)?,
        status: enum_column(row, 6)?,
        tags: json_list(row, 7)?,
        feature: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn warning_from_row(row: &Row<'_>) -> rusqlite::Result<Warning> {
    Ok(Warning {
        id: row.get(0)?,
        content: row.get(1)?,
        reason: row.get(2)?,
        evidence: row.get(3)?,
        severity: enum_column(row, 4)?,
        author: row.get(5)?,
        tags: json_list(row, 6)?,
        feature: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<Feature> {
    Ok(Feature {
        id: row.get(0)?,
        status: enum_column(row, 1)?,
        branch: row.get(2)?,
        extends: row.get(3)?,
        current_state: row.get(4)?,
        relevant_files: json_list(row, 5)?,
        owner: row.get(6)?,
        created_at: row.get(7)?,
        last_accessed: row.get(8)?,
        archived_at: row.get(9)?,
    })
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<CodeChunk> {
    Ok(CodeChunk {
        path: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        language: row.get(3)?,
        start_line: row.get(4)?,
        end_line: row.get(5)?,
        content: row.get(6)?,
    })
}

impl SearchIndex {
    fn query_rows<T>(
        &self,
        sql: &str,
        params: Vec<String>,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> IndexResult<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn search_files(
        &self,
        query: &str,
        filter: &FileFilter,
        limit: Option<usize>,
    ) -> IndexResult<Vec<FileIndex>> {
        let limit = limit.unwrap_or(DEFAULT_FILE_LIMIT);
        let mut from = String::from(
            "SELECT f.path, f.summary, f.exports, f.imports, f.language, f.patterns, \
             f.content_hash, f.indexed_at FROM files f",
        );
        let mut cond = Conditions::default();

        if let Some(fts) = build_match_query(query) {
            from.push_str(" JOIN files_fts ON files_fts.rowid = f.rowid");
            cond.push("files_fts MATCH ?", fts);
        }
        if let Some(language) = non_empty(filter.language.as_deref()) {
            cond.push("f.language = ?", language);
        }

        let sql = format!(
            "{from}{} ORDER BY f.indexed_at DESC, f.path ASC LIMIT {limit}",
            cond.sql()
        );
        let files = self.query_rows(&sql, cond.params, file_from_row)?;
        tracing::debug!(query = %query, results = files.len(), "file search");
        Ok(files)
    }

    pub fn search_decisions(
        &self,
        query: &str,
        filter: &DecisionFilter,
        limit: Option<usize>,
    ) -> IndexResult<Vec<Decision>> {
        let limit = limit.unwrap_or(DEFAULT_KNOWLEDGE_LIMIT);
        let mut from = String::from(
            "SELECT d.id, d.content, d.reason, d.context, d.alternatives, d.author, \
             d.status, d.tags, d.feature, d.created_at FROM decisions d",
        );
        let mut cond = Conditions::default();

        if let Some(fts) = build_match_query(query) {
            from.push_str(" JOIN decisions_fts ON decisions_fts.rowid = d.rowid");
            cond.push("decisions_fts MATCH ?", fts);
        }
        if let Some(feature) = non_empty(filter.feature.as_deref()) {
            cond.push("d.feature = ?", feature);
        }
        if let Some(status) = filter.status {
            cond.push("d.status = ?", status.as_str());
        }

        let sql = format!(
            "{from}{} ORDER BY d.created_at DESC, d.id DESC LIMIT {limit}",
            cond.sql()
        );
        let decisions = self.query_rows(&sql, cond.params, decision_from_row)?;
        tracing::debug!(query = %query, results = decisions.len(), "decision search");
        Ok(decisions)
    }

    pub fn search_warnings(
        &self,
        query: &str,
        filter: &WarningFilter,
        limit: Option<usize>,
    ) -> IndexResult<Vec<Warning>> {
        let limit = limit.unwrap_or(DEFAULT_KNOWLEDGE_LIMIT);
        let mut from = String::from(
            "SELECT w.id, w.content, w.reason, w.evidence, w.severity, w.author, \
             w.tags, w.feature, w.created_at FROM warnings w",
        );
        let mut cond = Conditions::default();

        if let Some(fts) = build_match_query(query) {
            from.push_str(" JOIN warnings_fts ON warnings_fts.rowid = w.rowid");
            cond.push("warnings_fts MATCH ?", fts);
        }
        if let Some(feature) = non_empty(filter.feature.as_deref()) {
            cond.push("w.feature = ?", feature);
        }
        if let Some(severity) = filter.severity {
            cond.push("w.severity = ?", severity.as_str());
        }

        let sql = format!(
            "{from}{} ORDER BY w.created_at DESC, w.id DESC LIMIT {limit}",
            cond.sql()
        );
        let warnings = self.query_rows(&sql, cond.params, warning_from_row)?;
        tracing::debug!(query = %query, results = warnings.len(), "warning search");
        Ok(warnings)
    }

    /// Chunks ordered by file then position.
    pub fn search_code_chunks(
        &self,
        query: &str,
        language: Option<&str>,
        limit: Option<usize>,
    ) -> IndexResult<Vec<CodeChunk>> {
        let limit = limit.unwrap_or(DEFAULT_CHUNK_LIMIT);
        let mut from = String::from(
            "SELECT c.path, c.name, c.kind, c.language, c.start_line, c.end_line, c.content \
             FROM code_chunks c",
        );
        let mut cond = Conditions::default();

        if let Some(fts) = build_match_query(query) {
            from.push_str(" JOIN code_chunks_fts ON code_chunks_fts.rowid = c.id");
            cond.push("code_chunks_fts MATCH ?", fts);
        }
        if let Some(language) = non_empty(language) {
            cond.push("c.language = ?", language);
        }

        let sql = format!(
            "{from}{} ORDER BY c.path ASC, c.start_line ASC LIMIT {limit}",
            cond.sql()
        );
        self.query_rows(&sql, cond.params, chunk_from_row)
    }

    /// Features with the given status, most recently touched first.
    pub fn features_by_status(&self, status: FeatureStatus) -> IndexResult<Vec<Feature>> {
        self.query_rows(
            "SELECT id, status, branch, extends, current_state, relevant_files, owner, \
             created_at, last_accessed, archived_at FROM features \
             WHERE status = ?1 ORDER BY last_accessed DESC, id ASC",
            vec![status.as_str().to_string()],
            feature_from_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(id: &str, content: &str, feature: Option<&str>, created_at: &str) -> Decision {
        Decision {
            id: id.into(),
            content: content.into(),
            reason: String::new(),
            context: None,
            alternatives: vec![],
            author: "tester".into(),
            status: DecisionStatus::Active,
            tags: vec![],
            feature: feature.map(String::from),
            created_at: created_at.into(),
        }
    }

    fn warning(id: &str, content: &str, severity: Severity) -> Warning {
        Warning {
            id: id.into(),
            content: content.into(),
            reason: String::new(),
            evidence: None,
            severity,
            author: "tester".into(),
            tags: vec![],
            feature: Some("auth-v2".into()),
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn match_query_quotes_terms() {
        assert_eq!(build_match_query("jwt tokens").as_deref(), Some("\"jwt\" \"tokens\""));
        assert_eq!(build_match_query("auth*").as_deref(), Some("\"auth\"*"));
        assert_eq!(
            build_match_query("redis OR memcached").as_deref(),
            Some("\"redis\" OR \"memcached\"")
        );
        assert_eq!(build_match_query("say \"hi\"").as_deref(), Some("\"say\" \"hi\""));
    }

    #[test]
    fn match_query_drops_dangling_operators() {
        assert_eq!(build_match_query("OR jwt AND").as_deref(), Some("\"jwt\""));
        assert_eq!(
            build_match_query("jwt AND OR session").as_deref(),
            Some("\"jwt\" OR \"session\"")
        );
        assert_eq!(build_match_query("   "), None);
        assert_eq!(build_match_query("\"\" *"), None);
    }

    #[test]
    fn lower_case_operators_are_terms() {
        assert_eq!(
            build_match_query("cats or dogs").as_deref(),
            Some("\"cats\" \"or\" \"dogs\"")
        );
    }

    #[test]
    fn corrupt_list_column_is_an_error() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_decision(&decision("d1", "Use JWT", None, "2026-01-01T00:00:00Z"))
            .unwrap();
        index
            .conn()
            .unwrap()
            .execute("UPDATE decisions SET tags = 'auth, jwt' WHERE id = 'd1'", [])
            .unwrap();

        let err = index
            .search_decisions("JWT", &DecisionFilter::default(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::index::IndexError::Sqlite(rusqlite::Error::FromSqlConversionFailure(7, Type::Text, _))
        ));
    }

    #[test]
    fn decisions_filter_and_order() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_decision(&decision("d1", "Use JWT for sessions", Some("auth-v2"), "2026-01-01T00:00:00Z"))
            .unwrap();
        index
            .index_decision(&decision("d2", "Rotate JWT signing keys", Some("auth-v2"), "2026-01-02T00:00:00Z"))
            .unwrap();
        index
            .index_decision(&decision("d3", "JWT in billing too", Some("billing"), "2026-01-03T00:00:00Z"))
            .unwrap();

        let hits = index
            .search_decisions(
                "JWT",
                &DecisionFilter {
                    feature: Some("auth-v2".into()),
                    status: None,
                },
                None,
            )
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);

        let all = index.search_decisions("", &DecisionFilter::default(), Some(2)).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "d3");
    }

    #[test]
    fn empty_filter_strings_are_unset() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_decision(&decision("d1", "Use JWT", None, "2026-01-01T00:00:00Z"))
            .unwrap();
        let hits = index
            .search_decisions(
                "jwt",
                &DecisionFilter {
                    feature: Some(String::new()),
                    status: None,
                },
                None,
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn warnings_filter_by_severity() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_warning(&warning("w1", "Token expiry is short", Severity::Critical))
            .unwrap();
        index
            .index_warning(&warning("w2", "Token logs are noisy", Severity::Info))
            .unwrap();

        let critical = index
            .search_warnings(
                "token",
                &WarningFilter {
                    feature: None,
                    severity: Some(Severity::Critical),
                },
                None,
            )
            .unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].id, "w1");
        assert_eq!(critical[0].severity, Severity::Critical);
    }

    #[test]
    fn prefix_query_matches_files() {
        let index = SearchIndex::open_in_memory().unwrap();
        index
            .index_file(&FileIndex {
                path: "src/authentication.rs".into(),
                summary: "authentication middleware".into(),
                exports: vec!["verify_token".into()],
                imports: vec![],
                language: Some("rust".into()),
                patterns: vec![],
                content_hash: "h".into(),
                indexed_at: "2026-01-01T00:00:00Z".into(),
            })
            .unwrap();

        let hits = index.search_files("auth*", &FileFilter::default(), None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].exports, vec!["verify_token"]);

        let python = index
            .search_files(
                "auth*",
                &FileFilter {
                    language: Some("python".into()),
                },
                None,
            )
            .unwrap();
        assert!(python.is_empty());
    }

    #[test]
    fn code_chunks_search() {
        let index = SearchIndex::open_in_memory().unwrap();
        let chunk = CodeChunk {
            path: "src/auth.rs".into(),
            name: "verify_token".into(),
            kind: "function".into(),
            language: Some("rust".into()),
            start_line: 10,
            end_line: 30,
            content: "fn verify_token(token: &str) -> bool { decode(token).is_ok() }".into(),
        };
        index.index_code_chunks("src/auth.rs", &[chunk]).unwrap();

        let hits = index.search_code_chunks("decode", None, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "verify_token");
        assert!(index
            .search_code_chunks("decode", Some("go"), None)
            .unwrap()
            .is_empty());
    }
}
