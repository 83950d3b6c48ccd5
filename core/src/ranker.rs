use crate::error::{Error, Result};
use crate::index::{DocumentId, TermWeights, WeightedScoreTable};
use crate::tokenizer::query_terms;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multiplier applied to the summed weight of exact matches.
pub const EXACT_MATCH_BOOST: f64 = 3.0;
pub const DEFAULT_FUZZY_DISTANCE_CEILING: f64 = 0.26;
pub const DEFAULT_MAX_RESULTS: usize = 10;
/// Above this ceiling `(1 - ceiling) - distance` can go negative.
pub const MAX_FUZZY_DISTANCE_CEILING: f64 = 0.5;

/// Accept fuzzy distance ceilings in `(0, MAX_FUZZY_DISTANCE_CEILING]`.
pub fn validate_ceiling(ceiling: f64) -> Result<()> {
    if ceiling > 0.0 && ceiling <= MAX_FUZZY_DISTANCE_CEILING {
        Ok(())
    } else {
        Err(Error::malformed(
            "rank options",
            format!("fuzzy distance ceiling {ceiling} is outside (0, {MAX_FUZZY_DISTANCE_CEILING}]"),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankOptions {
    pub fuzzy: bool,
    /// Normalized edit distance a fuzzy match must stay strictly below.
    pub fuzzy_distance_ceiling: f64,
    pub max_results: usize,
    /// Run queries through the document tokenizer instead of a plain whitespace split.
    pub normalize_query: bool,
    /// Keep only the closest N fuzzy matches per query term. `None` keeps all.
    pub max_fuzzy_matches_per_term: Option<usize>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            fuzzy: true,
            fuzzy_distance_ceiling: DEFAULT_FUZZY_DISTANCE_CEILING,
            max_results: DEFAULT_MAX_RESULTS,
            normalize_query: false,
            max_fuzzy_matches_per_term: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    pub weight: f64,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub relevancy: f64,
    /// Stored terms that matched, keyed by the stored (not the query) form.
    pub matched_terms: BTreeMap<String, TermMatch>,
}

/// Rank every document in the table against `query`.
///
/// Documents without any match are ranked too (relevancy 0) and only drop out
/// through `max_results`. Equal relevancies keep document id order; this is
/// an implementation detail, not a contract.
pub fn search(query: &str, scores: &WeightedScoreTable, opts: &RankOptions) -> Vec<SearchHit> {
    let terms = query_terms(query, opts.normalize_query);
    let mut hits: Vec<SearchHit> = scores
        .iter()
        .map(|(id, weights)| {
            let matched_terms = match_terms(&terms, weights, opts);
            SearchHit { document_id: id.clone(), relevancy: relevancy(&matched_terms), matched_terms }
        })
        .collect();
    hits.sort_by(|a, b| b.relevancy.total_cmp(&a.relevancy));
    hits.truncate(opts.max_results);
    hits
}

/// `EXACT_MATCH_BOOST * Σ exact + Σ fuzzy`
pub fn relevancy(matched: &BTreeMap<String, TermMatch>) -> f64 {
    let (exact, fuzzy) = matched.values().fold((0.0, 0.0), |(e, f), m| match m.kind {
        MatchKind::Exact => (e + m.weight, f),
        MatchKind::Fuzzy => (e, f + m.weight),
    });
    EXACT_MATCH_BOOST * exact + fuzzy
}

/// Match query terms against one document's weights.
///
/// Exact matches are collected first, so a stored term matched exactly by any
/// query term never also scores as fuzzy. A stored term that is fuzzy-matched
/// by several query terms keeps its best weight.
pub fn match_terms(terms: &[String], weights: &TermWeights, opts: &RankOptions) -> BTreeMap<String, TermMatch> {
    let mut matched = BTreeMap::new();
    for term in terms {
        if let Some(&weight) = weights.get(term) {
            matched.insert(term.clone(), TermMatch { weight, kind: MatchKind::Exact });
        }
    }
    if !opts.fuzzy {
        return matched;
    }

    // keeps fuzzy weights non-negative
    let ceiling = opts.fuzzy_distance_ceiling.clamp(0.0, MAX_FUZZY_DISTANCE_CEILING);
    for term in terms {
        let mut candidates: Vec<(&String, f64, f64)> = Vec::new();
        for (stored, &score) in weights {
            if matches!(matched.get(stored), Some(TermMatch { kind: MatchKind::Exact, .. })) {
                continue;
            }
            if let Some(distance) = normalized_distance(stored, term, ceiling) {
                candidates.push((stored, distance, ((1.0 - ceiling) - distance) * score));
            }
        }
        if let Some(cap) = opts.max_fuzzy_matches_per_term {
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
            candidates.truncate(cap);
        }
        for (stored, _, weight) in candidates {
            matched
                .entry(stored.clone())
                .and_modify(|m: &mut TermMatch| m.weight = m.weight.max(weight))
                .or_insert(TermMatch { weight, kind: MatchKind::Fuzzy });
        }
    }
    matched
}

/// `edit_distance(stored, query) / len(stored)` if it is below `ceiling`.
fn normalized_distance(stored: &str, query: &str, ceiling: f64) -> Option<f64> {
    let stored_len = stored.chars().count();
    if stored_len == 0 {
        return None;
    }
    // the length difference is a lower bound on the edit distance
    let diff = stored_len.abs_diff(query.chars().count());
    if diff as f64 / stored_len as f64 >= ceiling {
        return None;
    }
    let distance = levenshtein(stored, query) as f64 / stored_len as f64;
    (distance < ceiling).then_some(distance)
}

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
