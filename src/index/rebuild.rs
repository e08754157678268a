//! Regenerate the structured index from the canonical store.

use rusqlite::Connection;

use super::write::{upsert_decision, upsert_feature, upsert_file, upsert_warning};
use super::{IndexResult, SearchIndex};
use crate::error::StoreResult;
use crate::store::{KnowledgeSource, Salvaged};

/// Tables owned by [`SearchIndex`]. Semantic tables are cleared by the
/// semantic engine.
pub const STRUCTURED_TABLES: &[&str] = &["files", "decisions", "warnings", "features", "code_chunks"];

/// Per-collection counts of what a rebuild indexed, plus anything it skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    pub files: usize,
    pub decisions: usize,
    pub warnings: usize,
    pub features: usize,
    pub semantic_documents: usize,
    /// One line per record or collection that could not be indexed.
    pub failures: Vec<String>,
}

impl RebuildReport {
    pub fn indexed(&self) -> usize {
        self.files + self.decisions + self.warnings + self.features + self.semantic_documents
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report (e.g. the semantic pass) into this one.
    pub fn merge(&mut self, other: RebuildReport) {
        self.files += other.files;
        self.decisions += other.decisions;
        self.warnings += other.warnings;
        self.features += other.features;
        self.semantic_documents += other.semantic_documents;
        self.failures.extend(other.failures);
    }

    pub(crate) fn fail(&mut self, what: String) {
        tracing::warn!(failure = %what, "skipped during rebuild");
        self.failures.push(what);
    }
}

/// Delete every row. Rowids restart from 1 on the next insert, which keeps
/// repeated rebuilds byte-for-byte comparable.
pub(crate) fn clear_tables(conn: &Connection, tables: &[&str]) -> IndexResult<()> {
    for table in tables {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    Ok(())
}

/// Index one collection, tolerating a failed load, records that did not
/// decode and records the index rejects.
fn index_collection<T>(
    conn: &Connection,
    label: &str,
    loaded: StoreResult<Salvaged<T>>,
    key: fn(&T) -> &str,
    write: fn(&Connection, &T) -> IndexResult<()>,
    report: &mut RebuildReport,
) -> usize {
    let salvaged = match loaded {
        Ok(salvaged) => salvaged,
        Err(e) => {
            report.fail(format!("{label}: collection not loaded: {e}"));
            return 0;
        }
    };
    for skipped in salvaged.skipped {
        report.fail(format!("{label}: {skipped}"));
    }

    let mut indexed = 0;
    for item in &salvaged.items {
        match write(conn, item) {
            Ok(()) => indexed += 1,
            Err(e) => report.fail(format!("{label} {}: {e}", key(item))),
        }
    }
    indexed
}

impl SearchIndex {
    /// Clear the structured tables and repopulate them from `source` inside
    /// one transaction. Readers never see a half-built index.
    pub fn rebuild(&self, source: &dyn KnowledgeSource) -> IndexResult<RebuildReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        clear_tables(&tx, STRUCTURED_TABLES)?;

        let mut report = RebuildReport::default();
        let files = index_collection(
            &tx,
            "file",
            source.file_indexes(),
            |f| f.path.as_str(),
            upsert_file,
            &mut report,
        );
        let decisions = index_collection(
            &tx,
            "decision",
            source.decisions(),
            |d| d.id.as_str(),
            upsert_decision,
            &mut report,
        );
        let warnings = index_collection(
            &tx,
            "warning",
            source.warnings(),
            |w| w.id.as_str(),
            upsert_warning,
            &mut report,
        );
        let features = index_collection(
            &tx,
            "feature",
            source.all_features(),
            |f| f.id.as_str(),
            upsert_feature,
            &mut report,
        );
        report.files = files;
        report.decisions = decisions;
        report.warnings = warnings;
        report.features = features;

        tx.commit()?;
        tracing::info!(
            files = report.files,
            decisions = report.decisions,
            warnings = report.warnings,
            features = report.features,
            failures = report.failures.len(),
            "search index rebuilt"
        );
        Ok(report)
    }

    /// Deterministic textual dump of every derived table, one entry per table
    /// in rowid order. Two indexes built from the same store dump identically.
    pub fn dump(&self) -> IndexResult<Vec<(String, Vec<String>)>> {
        let conn = self.conn()?;
        let mut out = Vec::new();
        for table in super::schema::DERIVED_TABLES {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;
            let columns = stmt.column_count();
            let rows = stmt
                .query_map([], |row| {
                    let mut cells = Vec::with_capacity(columns);
                    for i in 0..columns {
                        cells.push(format!("{:?}", row.get_ref(i)?));
                    }
                    Ok(cells.join("|"))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            out.push((table.to_string(), rows));
        }
        Ok(out)
    }
}
