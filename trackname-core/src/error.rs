//! Error types for reading and rewriting score containers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use zip::result::ZipError;

/// Errors raised while scanning an embedded score document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("{0}")]
    Syntax(#[from] xmlparser::Error),

    #[error("closing tag </{found}> at byte {position} does not match <{expected}>")]
    MismatchedTag {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("closing tag </{found}> at byte {position} has no matching start tag")]
    UnexpectedClose { found: String, position: usize },

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("document has no root element")]
    NoRoot,
}

/// Errors reported by the editing core.
///
/// Every variant is recoverable: the caller keeps its record set and may retry.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("no *{extension} document found in {}", .archive.display())]
    NotFound { archive: PathBuf, extension: String },

    #[error("failed to parse {member}: {source}")]
    Parse {
        member: String,
        #[source]
        source: DocumentError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid archive: {0}")]
    Zip(#[from] ZipError),

    #[error("no changes to save")]
    NoChanges,

    #[error("no part with id {0:?}")]
    UnknownPart(String),

    #[error("part names cannot be empty")]
    EmptyName,

    #[error("no file is open")]
    NoFileOpen,

    #[error("renamed parts have no trackName to write: {}", .0.join(", "))]
    NothingWritable(Vec<String>),

    #[error("{} changed on disk since it was loaded; reload it first", .0.display())]
    OutOfDate(PathBuf),

    #[error("backup {} does not match {}", .backup.display(), .original.display())]
    BackupMismatch { original: PathBuf, backup: PathBuf },

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Attach a human-readable context to a raw `io::Error`.
pub(crate) trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T, EditError>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T, EditError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| EditError::Io {
            context: f(),
            source,
        })
    }
}
