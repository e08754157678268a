//! TF-IDF model and packed sparse vectors.

use std::collections::{BTreeMap, HashMap};

use super::tokenizer::tokenize;

/// A fitted vocabulary with smoothed inverse document frequencies.
///
/// Term indices follow the alphabetical order of the vocabulary, so fitting
/// the same corpus twice yields the same model.
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfModel {
    vocabulary: HashMap<String, u32>,
    terms: Vec<String>,
    idf: Vec<f32>,
    doc_count: usize,
}

impl TfIdfModel {
    /// Fit over a corpus. When the vocabulary exceeds `max_vocabulary`, the
    /// terms with the highest document frequency are kept (ties broken
    /// alphabetically).
    pub fn fit<'a>(texts: impl IntoIterator<Item = &'a str>, max_vocabulary: usize) -> Self {
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_count = 0usize;

        for text in texts {
            doc_count += 1;
            let mut seen: Vec<String> = tokenize(text);
            seen.sort();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let mut kept: Vec<(String, usize)> = df.into_iter().collect();
        if kept.len() > max_vocabulary {
            // Stable sort keeps alphabetical order among equal frequencies.
            kept.sort_by(|a, b| b.1.cmp(&a.1));
            kept.truncate(max_vocabulary);
            kept.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let n = doc_count as f32;
        let idf = kept
            .iter()
            .map(|(_, freq)| ((1.0 + n) / (1.0 + *freq as f32)).ln() + 1.0)
            .collect();
        let terms: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();

        Self::assemble(terms, idf, doc_count)
    }

    /// Rebuild a model from its persisted parts. Returns `None` if the parts
    /// disagree in length.
    pub fn from_parts(terms: Vec<String>, idf: Vec<f32>, doc_count: usize) -> Option<Self> {
        if terms.len() != idf.len() {
            return None;
        }
        Some(Self::assemble(terms, idf, doc_count))
    }

    fn assemble(terms: Vec<String>, idf: Vec<f32>, doc_count: usize) -> Self {
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i as u32))
            .collect();
        Self {
            vocabulary,
            terms,
            idf,
            doc_count,
        }
    }

    /// Terms in index order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    /// L2-normalised TF-IDF vector. Terms outside the vocabulary are ignored.
    pub fn vectorize(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx as usize]))
            .collect();

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut entries {
                *w /= norm;
            }
        }
        SparseVector { entries }
    }
}

/// Sparse vector of `(index, weight)` pairs sorted by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Little-endian `(u32 index, f32 weight)` pairs, 8 bytes each.
    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.entries.len() * 8);
        for (idx, weight) in &self.entries {
            bytes.extend_from_slice(&idx.to_le_bytes());
            bytes.extend_from_slice(&weight.to_le_bytes());
        }
        bytes
    }

    /// Inverse of [`pack`](Self::pack). A trailing partial pair is ignored.
    pub fn unpack(bytes: &[u8]) -> Self {
        let mut entries: Vec<(u32, f32)> = bytes
            .chunks_exact(8)
            .map(|c| {
                (
                    u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
            })
            .collect();
        entries.sort_by_key(|(idx, _)| *idx);
        Self { entries }
    }

    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_w) = self.entries[i];
            let (b_idx, b_w) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }

        let norm_a = self.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        let norm_b = other.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

/// Pack IDF weights as little-endian f32s.
pub fn pack_weights(weights: &[f32]) -> Vec<u8> {
    weights.iter().flat_map(|w| w.to_le_bytes()).collect()
}

pub fn unpack_weights(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &[&str] = &[
        "JWT tokens for session authentication",
        "Redis cache for session storage",
        "Postgres migrations run on deploy",
    ];

    #[test]
    fn fit_builds_sorted_vocabulary() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 100);
        assert_eq!(model.doc_count(), 3);
        let mut sorted = model.terms().to_vec();
        sorted.sort();
        assert_eq!(model.terms(), sorted.as_slice());
        assert!(model.terms().contains(&"session".to_string()));
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 100);
        let idx = |t: &str| model.terms().iter().position(|x| x == t).unwrap();
        // "session" is in two documents, "redis" in one.
        assert!(model.idf()[idx("redis")] > model.idf()[idx("session")]);
        let expected = (4.0f32 / 3.0).ln() + 1.0;
        assert!((model.idf()[idx("session")] - expected).abs() < 1e-6);
    }

    #[test]
    fn vocabulary_cap_keeps_frequent_terms() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 1);
        assert_eq!(model.terms(), &["session".to_string()]);
    }

    #[test]
    fn vectors_are_normalised_and_comparable() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 100);
        let a = model.vectorize("session authentication with JWT");
        let b = model.vectorize(CORPUS[0]);
        let c = model.vectorize(CORPUS[2]);

        assert!(!a.is_empty());
        assert!((b.cosine(&b) - 1.0).abs() < 1e-5);
        assert!(a.cosine(&b) > a.cosine(&c));
        assert_eq!(a.cosine(&c), 0.0);
    }

    #[test]
    fn unknown_terms_give_empty_vector() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 100);
        let v = model.vectorize("kubernetes helm");
        assert!(v.is_empty());
        assert_eq!(v.cosine(&model.vectorize(CORPUS[0])), 0.0);
    }

    #[test]
    fn packed_layout_is_little_endian_pairs() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 100);
        let v = model.vectorize(CORPUS[1]);
        let bytes = v.pack();
        assert_eq!(bytes.len(), v.len() * 8);
        assert_eq!(SparseVector::unpack(&bytes), v);

        let mut truncated = bytes.clone();
        truncated.push(0xff);
        assert_eq!(SparseVector::unpack(&truncated), v);
    }

    #[test]
    fn model_survives_persistence() {
        let model = TfIdfModel::fit(CORPUS.iter().copied(), 100);
        let restored = TfIdfModel::from_parts(
            model.terms().to_vec(),
            unpack_weights(&pack_weights(model.idf())),
            model.doc_count(),
        )
        .unwrap();
        assert_eq!(restored, model);
        assert!(TfIdfModel::from_parts(vec!["a".into()], vec![], 1).is_none());
    }
}
