use crate::stats::{index_document, TermStatistics};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of a transcript, the stem of its `{document_id}.txt` file.
pub type DocumentId = String;
pub type TermWeights = BTreeMap<String, f64>;
/// document id -> term -> tf·idf weight
pub type WeightedScoreTable = BTreeMap<DocumentId, TermWeights>;
pub type DocumentFrequency = BTreeMap<String, u32>;

/// Fully derived corpus state. There is no incremental update: any change to a
/// document's statistics means building a new `CorpusIndex` from the whole set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusIndex {
    pub stats: BTreeMap<DocumentId, TermStatistics>,
    pub df: DocumentFrequency,
    pub scores: WeightedScoreTable,
}

impl CorpusIndex {
    pub fn new() -> Self { Self::default() }

    pub fn build(stats: BTreeMap<DocumentId, TermStatistics>) -> Self {
        let df = document_frequency(&stats);
        let scores = weigh(&stats, &df);
        Self { stats, df, scores }
    }

    /// Tokenize and index every text, then build the corpus tables.
    pub fn from_texts(texts: &BTreeMap<DocumentId, String>) -> Self {
        Self::build(index_corpus(texts))
    }

    pub fn num_docs(&self) -> usize { self.stats.len() }

    pub fn num_terms(&self) -> usize { self.df.len() }
}

/// Index each document independently; runs across the rayon pool.
pub fn index_corpus(texts: &BTreeMap<DocumentId, String>) -> BTreeMap<DocumentId, TermStatistics> {
    texts
        .par_iter()
        .map(|(id, text)| (id.clone(), index_document(text)))
        .collect()
}

/// Number of documents containing each term at least once.
pub fn document_frequency(docs: &BTreeMap<DocumentId, TermStatistics>) -> DocumentFrequency {
    let mut df = DocumentFrequency::new();
    for stats in docs.values() {
        for (term, s) in &stats.terms {
            if s.count >= 1 {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
        }
    }
    df
}

/// Recompute the full weighted score table for a document set.
pub fn rebuild(docs: &BTreeMap<DocumentId, TermStatistics>) -> WeightedScoreTable {
    let df = document_frequency(docs);
    weigh(docs, &df)
}

fn weigh(docs: &BTreeMap<DocumentId, TermStatistics>, df: &DocumentFrequency) -> WeightedScoreTable {
    let n = docs.len();
    if n == 0 {
        return WeightedScoreTable::new();
    }

    let mut table = WeightedScoreTable::new();
    for (id, stats) in docs {
        let mut weights = TermWeights::new();
        for (term, s) in &stats.terms {
            // df >= 1 for every term present in this document
            let df_t = df.get(term).copied().unwrap_or(1).max(1);
            let idf = (n as f64 / df_t as f64).ln();
            weights.insert(term.clone(), s.tf_score * idf);
        }
        table.insert(id.clone(), weights);
    }
    tracing::debug!(num_docs = n, num_terms = df.len(), "weighted score table rebuilt");
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(pairs: &[(&str, &str)]) -> BTreeMap<DocumentId, String> {
        pairs.iter().map(|(id, t)| (id.to_string(), t.to_string())).collect()
    }

    #[test]
    fn empty_corpus_has_empty_table() {
        let index = CorpusIndex::from_texts(&BTreeMap::new());
        assert_eq!(index.num_docs(), 0);
        assert!(index.scores.is_empty());
        assert!(rebuild(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn term_in_every_document_weighs_zero() {
        let index = CorpusIndex::from_texts(&texts(&[("a", "path one"), ("b", "path two")]));
        assert_eq!(index.df["path"], 2);
        assert_eq!(index.scores["a"]["path"], 0.0);
        assert!(index.scores["a"]["one"] > 0.0);
    }

    #[test]
    fn zero_length_document_counts_toward_n() {
        let index = CorpusIndex::from_texts(&texts(&[("a", "zoning"), ("empty", "")]));
        assert_eq!(index.num_docs(), 2);
        assert!(index.scores["empty"].is_empty());
        assert_eq!(index.scores["a"]["zoning"], 1.0 * 2f64.ln());
    }
}
