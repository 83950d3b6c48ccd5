//! Indexing and relevancy search over meeting transcripts.
//!
//! The pipeline runs leaf-first: [`versions`] decides each transcript's
//! authoritative text, [`tokenizer`] and [`stats`] turn it into term
//! statistics, [`index`] weighs every term across the corpus, and [`ranker`]
//! answers queries against the resulting score table.

pub mod error;
pub mod export;
pub mod index;
pub mod persist;
pub mod ranker;
pub mod stats;
pub mod tokenizer;
pub mod transcripts;
pub mod versions;

pub use error::{Error, Result};
pub use index::{CorpusIndex, DocumentFrequency, DocumentId, TermWeights, WeightedScoreTable};
pub use ranker::{search, MatchKind, RankOptions, SearchHit, TermMatch};
pub use stats::{index_document, TermStatistics, TermStats};
pub use transcripts::TranscriptDir;
pub use versions::{reconcile, Version, VersionHistory, VersionStore};
