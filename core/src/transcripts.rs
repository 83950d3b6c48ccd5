use crate::error::{Error, Result};
use crate::index::DocumentId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const EXTENSION: &str = "txt";

/// A flat directory of `{document_id}.txt` transcripts.
#[derive(Debug, Clone)]
pub struct TranscriptDir {
    pub root: PathBuf,
}

impl TranscriptDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, id: &str) -> PathBuf { self.root.join(format!("{id}.{EXTENSION}")) }

    /// Ids of all transcripts directly under the root, sorted.
    pub fn document_ids(&self) -> Result<Vec<DocumentId>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                Error::io(path, e.into())
            })?;
            let p = entry.path();
            if !entry.file_type().is_file() || p.extension().and_then(|s| s.to_str()) != Some(EXTENSION) {
                continue;
            }
            let id = p
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::malformed(p.display().to_string(), "file name is not a valid document id"))?;
            ids.push(id.to_string());
        }
        ids.sort();
        Ok(ids)
    }

    /// Read a transcript; `None` if it is not on disk.
    pub fn read(&self, id: &str) -> Result<Option<String>> {
        let path = self.path_for(id);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn write(&self, id: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let path = self.path_for(id);
        fs::write(&path, text).map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_only_txt_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("full_council_2018-01-02.txt"), "a").unwrap();
        fs::write(dir.path().join("notes.md"), "b").unwrap();
        fs::create_dir(dir.path().join("splits")).unwrap();
        fs::write(dir.path().join("splits/part_0.txt"), "c").unwrap();

        let transcripts = TranscriptDir::new(dir.path());
        assert_eq!(transcripts.document_ids().unwrap(), vec!["full_council_2018-01-02"]);
    }

    #[test]
    fn missing_transcript_reads_as_none() {
        let dir = tempdir().unwrap();
        let transcripts = TranscriptDir::new(dir.path());
        assert_eq!(transcripts.read("nope").unwrap(), None);
        transcripts.write("yes", "text").unwrap();
        assert_eq!(transcripts.read("yes").unwrap().as_deref(), Some("text"));
    }
}
