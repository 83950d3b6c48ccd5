use crate::error::{Error, Result};
use crate::index::WeightedScoreTable;
use crate::versions::VersionHistory;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_terms: usize,
    #[serde(default)]
    pub rewritten_documents: Vec<String>,
    pub created_at: String,
    pub version: u32,
    #[serde(default)]
    pub build_seconds: f64,
}

/// Layout of an index directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn scores(&self) -> PathBuf { self.root.join("scores.bin") }
    pub fn versions(&self) -> PathBuf { self.root.join("versions.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let f = File::create(path).map_err(|e| Error::io(path, e))?;
    Ok(BufWriter::new(f))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let f = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(BufReader::new(f))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, value).map_err(|e| Error::malformed(path.display().to_string(), e))?;
    w.flush().map_err(|e| Error::io(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    serde_json::from_reader(open(path)?).map_err(|e| Error::malformed(path.display().to_string(), e))
}

pub fn save_scores(paths: &IndexPaths, scores: &WeightedScoreTable) -> Result<()> {
    let path = paths.scores();
    let mut w = create(&path)?;
    bincode::serialize_into(&mut w, scores).map_err(|e| Error::malformed(path.display().to_string(), e))?;
    w.flush().map_err(|e| Error::io(&path, e))
}

pub fn load_scores(paths: &IndexPaths) -> Result<WeightedScoreTable> {
    let path = paths.scores();
    bincode::deserialize_from(open(&path)?).map_err(|e| Error::malformed(path.display().to_string(), e))
}

pub fn save_versions(paths: &IndexPaths, history: &VersionHistory) -> Result<()> {
    write_json(&paths.versions(), history)
}

/// Load a version history file; a missing file is an empty history.
pub fn load_versions_file(path: &Path) -> Result<VersionHistory> {
    match File::open(path) {
        Ok(_) => read_json(path),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(VersionHistory::new()),
        Err(e) => Err(Error::io(path, e)),
    }
}

pub fn load_versions(paths: &IndexPaths) -> Result<VersionHistory> {
    load_versions_file(&paths.versions())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    write_json(&paths.meta(), meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    read_json(&paths.meta())
}

/// Everything a query server needs from an index directory.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub scores: WeightedScoreTable,
    pub versions: VersionHistory,
    pub num_docs: usize,
}

pub fn load_snapshot(paths: &IndexPaths) -> Result<Snapshot> {
    let scores = load_scores(paths)?;
    let versions = load_versions(paths)?;
    let meta = load_meta(paths)?;
    Ok(Snapshot { scores, versions, num_docs: meta.num_docs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::Version;
    use tempfile::tempdir;

    #[test]
    fn legacy_version_keys_are_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{"council_010118": [{"full_text": "hi", "datetime": "2018-01-01 10:00:00.5", "version_shortname": "council_2018-01-01T10-0"}]}"#,
        )
        .unwrap();
        let history = load_versions_file(&path).unwrap();
        assert_eq!(
            history["council_010118"],
            vec![Version {
                full_text: "hi".into(),
                created_at: "2018-01-01 10:00:00.5".into(),
                short_name: "council_2018-01-01T10-0".into(),
            }]
        );
    }

    #[test]
    fn missing_versions_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_versions_file(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn garbage_scores_are_malformed() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        std::fs::write(paths.scores(), b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        assert!(matches!(load_scores(&paths), Err(Error::MalformedInput { .. })));
    }
}
