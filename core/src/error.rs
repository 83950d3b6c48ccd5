use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document, version record or persisted artifact that could not be parsed.
    #[error("malformed input in {what}: {reason}")]
    MalformedInput { what: String, reason: String },

    /// The version history for a document has no establishable order.
    #[error("version conflict for {document_id} at version {index} ({created_at}): {reason}")]
    VersionConflict {
        document_id: String,
        index: usize,
        created_at: String,
        reason: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(what: impl Into<String>, reason: impl ToString) -> Self {
        Error::MalformedInput { what: what.into(), reason: reason.to_string() }
    }
}
