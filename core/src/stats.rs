use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermStats {
    pub count: u32,
    /// `count / length` of the owning document.
    pub tf_score: f64,
}

/// Per-document term statistics. A zero-length document has no terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermStatistics {
    pub length: usize,
    pub terms: BTreeMap<String, TermStats>,
}

impl TermStatistics {
    pub fn is_empty(&self) -> bool { self.length == 0 }

    pub fn contains(&self, term: &str) -> bool { self.terms.contains_key(term) }

    pub fn tf_score(&self, term: &str) -> Option<f64> { self.terms.get(term).map(|s| s.tf_score) }
}

/// Compute term statistics for one document's authoritative text.
pub fn index_document(text: &str) -> TermStatistics {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return TermStatistics::default();
    }
    let length = tokens.len();

    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for term in tokens {
        *counts.entry(term).or_insert(0) += 1;
    }

    let terms = counts
        .into_iter()
        .map(|(term, count)| {
            let tf_score = count as f64 / length as f64;
            (term, TermStats { count, tf_score })
        })
        .collect();
    TermStatistics { length, terms }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tf_is_count_over_token_length() {
        let stats = index_document("bicycle bicycle path");
        assert_eq!(stats.length, 3);
        assert_eq!(stats.terms["bicycle"].count, 2);
        assert_eq!(stats.tf_score("bicycle"), Some(2.0 / 3.0));
        assert_eq!(stats.tf_score("path"), Some(1.0 / 3.0));
    }

    #[test]
    fn empty_text_has_no_terms() {
        for text in ["", "   \n\t", "### $$"] {
            let stats = index_document(text);
            assert!(stats.is_empty());
            assert!(stats.terms.is_empty());
        }
    }
}
