//! Similarity search over knowledge text with a persisted TF-IDF model.
//!
//! Ranking is approximate: scanning stops early once enough high-confidence
//! matches have been seen. Sized for corpora up to roughly ten thousand
//! documents; there is no nearest-neighbour index.

pub mod index;
pub mod model;
pub mod tokenizer;

use std::fmt;
use std::str::FromStr;

use crate::error::StoreResult;
use crate::store::{KnowledgeSource, Salvaged};

pub use index::{SemanticHit, SemanticIndex};
pub use model::{SparseVector, TfIdfModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    Decision,
    Warning,
    Insight,
    Pattern,
    File,
    Conversation,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Warning => "warning",
            Self::Insight => "insight",
            Self::Pattern => "pattern",
            Self::File => "file",
            Self::Conversation => "conversation",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(Self::Decision),
            "warning" => Ok(Self::Warning),
            "insight" => Ok(Self::Insight),
            "pattern" => Ok(Self::Pattern),
            "file" => Ok(Self::File),
            "conversation" => Ok(Self::Conversation),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// One unit of searchable text.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticDocument {
    pub id: String,
    pub doc_type: DocType,
    pub content: String,
}

impl SemanticDocument {
    pub fn new(id: impl Into<String>, doc_type: DocType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type,
            content: content.into(),
        }
    }
}

fn join_text<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decoded records of one collection; everything skipped goes to `failures`.
fn collect<T>(
    label: &str,
    loaded: StoreResult<Salvaged<T>>,
    failures: &mut Vec<String>,
) -> Vec<T> {
    match loaded {
        Ok(salvaged) => {
            failures.extend(salvaged.skipped.into_iter().map(|s| format!("{label}: {s}")));
            salvaged.items
        }
        Err(e) => {
            failures.push(format!("{label}: collection not loaded: {e}"));
            Vec::new()
        }
    }
}

/// Every searchable document in `source`, plus one failure line per
/// collection that could not be read and per record that did not decode.
pub fn documents_from(source: &dyn KnowledgeSource) -> (Vec<SemanticDocument>, Vec<String>) {
    let mut docs = Vec::new();
    let mut failures = Vec::new();

    for d in collect("decision", source.decisions(), &mut failures) {
        let tags = d.tags.join(" ");
        let text = join_text([
            d.content.as_str(),
            d.reason.as_str(),
            d.context.as_deref().unwrap_or(""),
            tags.as_str(),
        ]);
        docs.push(SemanticDocument::new(d.id, DocType::Decision, text));
    }

    for w in collect("warning", source.warnings(), &mut failures) {
        let text = join_text([
            w.content.as_str(),
            w.reason.as_str(),
            w.evidence.as_deref().unwrap_or(""),
        ]);
        docs.push(SemanticDocument::new(w.id, DocType::Warning, text));
    }

    for i in collect("insight", source.insights(), &mut failures) {
        docs.push(SemanticDocument::new(i.id, DocType::Insight, i.content));
    }

    for p in collect("pattern", source.patterns(), &mut failures) {
        let text = join_text([p.name.as_str(), p.description.as_str()]);
        docs.push(SemanticDocument::new(p.id, DocType::Pattern, text));
    }

    for f in collect("file", source.file_indexes(), &mut failures) {
        let exports = f.exports.join(" ");
        let text = join_text([f.path.as_str(), f.summary.as_str(), exports.as_str()]);
        docs.push(SemanticDocument::new(f.path, DocType::File, text));
    }

    for c in collect("conversation", source.all_conversations(), &mut failures) {
        let mut parts = vec![c.summary.as_str()];
        parts.extend(c.key_points.iter().map(String::as_str));
        let text = join_text(parts);
        docs.push(SemanticDocument::new(c.id, DocType::Conversation, text));
    }

    (docs, failures)
}
