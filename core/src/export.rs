use crate::error::{Error, Result};
use crate::index::WeightedScoreTable;
use crate::persist::write_json;
use crate::versions::VersionHistory;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// The single record handed to the remote store: event feeds, scores and history.
#[derive(Debug, Serialize)]
pub struct CombinedRecord<'a> {
    pub events: BTreeMap<String, Value>,
    pub events_tfidf: &'a WeightedScoreTable,
    pub transcript_versioning: &'a VersionHistory,
}

/// Key feed records by their `naming` field. Records with an empty or missing
/// name are skipped; anything that is not an array of objects is malformed.
pub fn events_by_naming(feeds: Value) -> Result<BTreeMap<String, Value>> {
    let Value::Array(items) = feeds else {
        return Err(Error::malformed("event feeds", "expected a JSON array"));
    };
    let mut events = BTreeMap::new();
    for (i, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(Error::malformed("event feeds", format!("item {i} is not an object")));
        }
        let naming = item.get("naming").and_then(Value::as_str).unwrap_or_default().to_string();
        if !naming.is_empty() {
            events.insert(naming, item);
        }
    }
    Ok(events)
}

/// Write `combined_data.json` plus a timestamped copy; returns both paths.
pub fn write_combined(dir: &Path, record: &CombinedRecord<'_>, now: OffsetDateTime) -> Result<Vec<PathBuf>> {
    let stamp = now
        .format(format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]"))
        .map_err(|e| Error::malformed("export timestamp", e))?;
    let paths = vec![dir.join("combined_data.json"), dir.join(format!("combined_data_{stamp}.json"))];
    for p in &paths {
        write_json(p, record)?;
    }
    tracing::info!(events = record.events.len(), documents = record.events_tfidf.len(), "wrote combined record");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feeds_keyed_by_naming() {
        let feeds = json!([
            {"naming": "full_council_010118", "link": "a"},
            {"naming": "", "link": "b"},
            {"link": "c"}
        ]);
        let events = events_by_naming(feeds).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events["full_council_010118"]["link"], "a");
    }

    #[test]
    fn feeds_must_be_an_array() {
        assert!(matches!(events_by_naming(json!({"naming": "x"})), Err(Error::MalformedInput { .. })));
        assert!(events_by_naming(json!([1])).is_err());
    }
}
