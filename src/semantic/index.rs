//! Persistence and querying of semantic vectors in the search database.

use rusqlite::{params, Connection, OptionalExtension};

use super::model::{pack_weights, unpack_weights, SparseVector, TfIdfModel};
use super::{documents_from, DocType, SemanticDocument};
use crate::config::SemanticConfig;
use crate::index::meta::{set_tokenizer_version, TOKENIZER_VERSION};
use crate::index::rebuild::{clear_tables, RebuildReport};
use crate::index::{DerivedIndex, IndexError, IndexResult, SearchIndex};
use crate::store::KnowledgeSource;

const SEMANTIC_TABLES: &[&str] = &["semantic_documents", "semantic_model"];

/// Candidates gathered before sorting, relative to the requested limit.
const CANDIDATE_FACTOR: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    pub id: String,
    pub doc_type: DocType,
    pub content: String,
    pub similarity: f32,
}

/// Semantic view over a [`SearchIndex`], sharing its connection.
pub struct SemanticIndex<'a> {
    index: &'a SearchIndex,
    config: SemanticConfig,
}

impl SearchIndex {
    pub fn semantic(&self, config: &SemanticConfig) -> SemanticIndex<'_> {
        SemanticIndex {
            index: self,
            config: config.clone(),
        }
    }
}

fn read_model(conn: &Connection) -> IndexResult<Option<TfIdfModel>> {
    let row = conn
        .query_row(
            "SELECT vocabulary, idf, doc_count FROM semantic_model WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((vocabulary, idf, doc_count)) = row else {
        return Ok(None);
    };
    let terms: Vec<String> = serde_json::from_str(&vocabulary)?;
    let model = TfIdfModel::from_parts(terms, unpack_weights(&idf), doc_count.max(0) as usize);
    if model.is_none() {
        tracing::warn!("stored semantic model is inconsistent; treating as unfitted");
    }
    Ok(model)
}

fn write_document(
    conn: &Connection,
    model: &TfIdfModel,
    doc: &SemanticDocument,
) -> IndexResult<()> {
    let vector = model.vectorize(&doc.content);
    conn.execute(
        "INSERT INTO semantic_documents (id, doc_type, content, vector) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(id) DO UPDATE SET \
            doc_type = excluded.doc_type, content = excluded.content, vector = excluded.vector",
        params![doc.id, doc.doc_type.as_str(), doc.content, vector.pack()],
    )?;
    Ok(())
}

impl SemanticIndex<'_> {
    /// Fit a fresh model over `docs`, persist it, and replace every stored
    /// vector. Returns the number of documents indexed.
    pub fn fit_and_index(&self, docs: &[SemanticDocument]) -> IndexResult<usize> {
        let model = TfIdfModel::fit(
            docs.iter().map(|d| d.content.as_str()),
            self.config.max_vocabulary,
        );

        let mut conn = self.index.conn()?;
        let tx = conn.transaction()?;
        clear_tables(&tx, SEMANTIC_TABLES)?;
        tx.execute(
            "INSERT INTO semantic_model (id, vocabulary, idf, doc_count) VALUES (1, ?1, ?2, ?3)",
            params![
                serde_json::to_string(model.terms())?,
                pack_weights(model.idf()),
                model.doc_count() as i64,
            ],
        )?;
        for doc in docs {
            write_document(&tx, &model, doc)?;
        }
        set_tokenizer_version(&tx, TOKENIZER_VERSION)?;
        tx.commit()?;

        tracing::info!(
            documents = docs.len(),
            vocabulary = model.vocabulary_size(),
            "semantic model fitted"
        );
        Ok(docs.len())
    }

    /// Vectorize one document with the stored model and upsert it.
    /// Returns `false` without writing when no model has been fitted yet.
    pub fn index_document(&self, doc: &SemanticDocument) -> IndexResult<bool> {
        let conn = self.index.conn()?;
        let Some(model) = read_model(&conn)? else {
            tracing::debug!(id = %doc.id, "no semantic model; document not indexed");
            return Ok(false);
        };
        write_document(&conn, &model, doc)?;
        Ok(true)
    }

    pub fn load_model(&self) -> IndexResult<Option<TfIdfModel>> {
        read_model(&*self.index.conn()?)
    }

    /// Rank stored documents by cosine similarity to `query`.
    ///
    /// Results below the similarity floor are dropped. The scan stops early
    /// once `limit` results reach the high-confidence threshold and at least
    /// three times `limit` candidates have been collected, so a better match
    /// later in the table can be missed.
    pub fn search(
        &self,
        query: &str,
        doc_type: Option<DocType>,
        limit: usize,
    ) -> IndexResult<Vec<SemanticHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.index.conn()?;
        let model = read_model(&conn)?.ok_or(IndexError::ModelNotFitted)?;
        let query_vec = model.vectorize(query);
        if query_vec.is_empty() {
            return Ok(Vec::new());
        }

        let (sql, filter): (&str, Vec<String>) = match doc_type {
            Some(ty) => (
                "SELECT id, doc_type, content, vector FROM semantic_documents \
                 WHERE doc_type = ?1 ORDER BY rowid",
                vec![ty.as_str().to_string()],
            ),
            None => (
                "SELECT id, doc_type, content, vector FROM semantic_documents ORDER BY rowid",
                Vec::new(),
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(filter))?;

        let mut candidates: Vec<SemanticHit> = Vec::new();
        let mut high_confidence = 0usize;
        let mut scanned = 0usize;

        while let Some(row) = rows.next()? {
            scanned += 1;
            let vector: Vec<u8> = row.get(3)?;
            let similarity = query_vec.cosine(&SparseVector::unpack(&vector));
            if similarity < self.config.similarity_floor {
                continue;
            }

            let ty: String = row.get(1)?;
            let Ok(ty) = ty.parse::<DocType>() else {
                continue;
            };
            if similarity >= self.config.high_confidence {
                high_confidence += 1;
            }
            candidates.push(SemanticHit {
                id: row.get(0)?,
                doc_type: ty,
                content: row.get(2)?,
                similarity,
            });

            if high_confidence >= limit && candidates.len() >= limit * CANDIDATE_FACTOR {
                tracing::debug!(scanned, "semantic scan stopped early");
                break;
            }
        }

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        Ok(candidates)
    }
}

impl DerivedIndex for SemanticIndex<'_> {
    fn clear(&self) -> IndexResult<()> {
        clear_tables(&*self.index.conn()?, SEMANTIC_TABLES)
    }

    fn rebuild_from(&self, source: &dyn KnowledgeSource) -> IndexResult<RebuildReport> {
        let (docs, failures) = documents_from(source);
        let mut report = RebuildReport::default();
        for failure in failures {
            report.fail(failure);
        }
        report.semantic_documents = self.fit_and_index(&docs)?;
        Ok(report)
    }
}
