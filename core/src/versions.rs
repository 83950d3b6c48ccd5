use crate::error::{Error, Result};
use crate::index::DocumentId;
use crate::transcripts::TranscriptDir;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// An immutable snapshot of a transcript's full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub full_text: String,
    #[serde(alias = "datetime")]
    pub created_at: String,
    /// Display label only, never a lookup key.
    #[serde(alias = "version_shortname")]
    pub short_name: String,
}

impl Version {
    /// Wrap locally persisted text as the first version of a document.
    pub fn seed(document_id: &str, full_text: &str, now: OffsetDateTime) -> Result<Self> {
        let created_at = now.format(&Rfc3339).map_err(|e| Error::malformed("version timestamp", e))?;
        Ok(Self { full_text: full_text.to_string(), created_at, short_name: short_name(document_id, now) })
    }
}

/// Ordered (oldest first) versions per document. Append-only.
pub type VersionHistory = BTreeMap<DocumentId, Vec<Version>>;

/// `{prefix}_{date}T{hour}-{minute}`, where prefix is the id up to its last `_`.
pub fn short_name(document_id: &str, at: OffsetDateTime) -> String {
    let prefix = document_id.rfind('_').map_or(document_id, |i| &document_id[..i]);
    format!("{prefix}_{}T{}-{}", at.date(), at.hour(), at.minute())
}

/// A parsed `created_at`. Zone-less timestamps are kept naive: they were written
/// in the producer's local time, which is unknown here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Zoned(OffsetDateTime),
    Naive(PrimitiveDateTime),
}

/// Parse a version timestamp: RFC 3339, or `YYYY-MM-DD HH:MM:SS[.ffffff]` without a zone.
pub fn parse_created_at(s: &str) -> Option<Timestamp> {
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(Timestamp::Zoned(t));
    }
    PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"))
        .or_else(|_| PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")))
        .ok()
        .map(Timestamp::Naive)
}

/// Check that every timestamp parses and that zoned timestamps never run
/// backwards. Naive timestamps are not compared against anything.
pub fn check_ordering(document_id: &str, versions: &[Version]) -> Result<()> {
    let mut previous: Option<OffsetDateTime> = None;
    for (index, v) in versions.iter().enumerate() {
        let conflict = |reason: &str| Error::VersionConflict {
            document_id: document_id.to_string(),
            index,
            created_at: v.created_at.clone(),
            reason: reason.to_string(),
        };
        match parse_created_at(&v.created_at).ok_or_else(|| conflict("unparseable timestamp"))? {
            Timestamp::Zoned(at) => {
                if previous.is_some_and(|p| at < p) {
                    return Err(conflict("created before the preceding version"));
                }
                previous = Some(at);
            }
            Timestamp::Naive(_) => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No known versions; the local text became the first version.
    Seeded,
    /// The local text already matches the latest version.
    Current,
    /// The local copy is stale (or missing) and must be replaced by the latest version.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub text: String,
    pub history: Vec<Version>,
    pub outcome: Outcome,
}

/// Decide the authoritative text for a document.
///
/// The last known version always wins. Known versions are never dropped or
/// reordered; a seed version is only created when there are none.
pub fn reconcile(
    document_id: &str,
    local_text: Option<&str>,
    known: Option<&[Version]>,
    now: OffsetDateTime,
) -> Result<Reconciled> {
    let latest = match known {
        Some(versions) => {
            check_ordering(document_id, versions)?;
            versions.last().map(|v| (v, versions))
        }
        None => None,
    };

    match latest {
        Some((latest, versions)) => {
            let outcome = if local_text == Some(latest.full_text.as_str()) { Outcome::Current } else { Outcome::Stale };
            Ok(Reconciled { text: latest.full_text.clone(), history: versions.to_vec(), outcome })
        }
        None => {
            let text = local_text.unwrap_or_default();
            let seed = Version::seed(document_id, text, now)?;
            Ok(Reconciled { text: text.to_string(), history: vec![seed], outcome: Outcome::Seeded })
        }
    }
}

/// Result of reconciling a whole transcript directory.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Authoritative text for every document in the corpus.
    pub texts: BTreeMap<DocumentId, String>,
    pub seeded: Vec<DocumentId>,
    pub rewritten: Vec<DocumentId>,
}

#[derive(Debug, Clone, Default)]
pub struct VersionStore {
    history: VersionHistory,
}

impl VersionStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_history(history: VersionHistory) -> Self { Self { history } }

    pub fn history(&self) -> &VersionHistory { &self.history }

    pub fn into_history(self) -> VersionHistory { self.history }

    pub fn versions(&self, id: &str) -> &[Version] {
        self.history.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn latest(&self, id: &str) -> Option<&Version> { self.versions(id).last() }

    /// Fold an externally sourced history in. Versions not already known are
    /// appended in external order; nothing stored is dropped or reordered.
    /// Returns the number of appended versions.
    pub fn merge(&mut self, external: VersionHistory) -> usize {
        let mut appended = 0;
        for (id, versions) in external {
            let known = self.history.entry(id).or_default();
            for v in versions {
                if !known.contains(&v) {
                    known.push(v);
                    appended += 1;
                }
            }
        }
        appended
    }

    /// Check every stored history, logging each conflict; fails with the first.
    pub fn check_all(&self) -> Result<()> {
        let mut first = None;
        for (id, versions) in &self.history {
            if let Err(e) = check_ordering(id, versions) {
                tracing::warn!(document_id = %id, error = %e, "version history conflict");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Reconcile every transcript on disk plus every document with a stored
    /// history, rewriting stale files before returning their text. Every
    /// history is checked up front, so a conflict leaves all files untouched.
    pub fn reconcile_dir(&mut self, dir: &TranscriptDir, now: OffsetDateTime) -> Result<Reconciliation> {
        self.check_all()?;
        let mut ids: BTreeSet<DocumentId> = dir.document_ids()?.into_iter().collect();
        ids.extend(self.history.iter().filter(|(_, v)| !v.is_empty()).map(|(id, _)| id.clone()));

        let mut out = Reconciliation::default();
        for id in ids {
            let local = dir.read(&id)?;
            let known = self.history.get(&id).filter(|v| !v.is_empty()).map(Vec::as_slice);
            let reconciled = reconcile(&id, local.as_deref(), known, now)?;
            match reconciled.outcome {
                Outcome::Stale => {
                    dir.write(&id, &reconciled.text)?;
                    tracing::info!(document_id = %id, "rewrote stale transcript from latest version");
                    out.rewritten.push(id.clone());
                }
                Outcome::Seeded => out.seeded.push(id.clone()),
                Outcome::Current => {}
            }
            self.history.insert(id.clone(), reconciled.history);
            out.texts.insert(id, reconciled.text);
        }
        tracing::info!(
            documents = out.texts.len(),
            seeded = out.seeded.len(),
            rewrites = out.rewritten.len(),
            "reconciled version history"
        );
        Ok(out)
    }
}
