use std::path::PathBuf;

use deltagrid_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    /// File could not be opened, read or written.
    #[error("{}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: CSV error: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
    #[error("{}: Excel error: {message}", .path.display())]
    Xlsx { path: PathBuf, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A data row has more fields than the header.
    #[error("line {line}: expected {expected} fields, found {found}")]
    Shape {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("data dictionary {}: {message}", .path.display())]
    Dictionary { path: PathBuf, message: String },
    #[error("no snapshot for subject '{subject}' in {}", .dir.display())]
    NotFound { dir: PathBuf, subject: String },
    #[error("{}: unsupported file type", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error(transparent)]
    Table(#[from] ReconError),
}

impl IoError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read { path: path.into(), source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: ::csv::Error) -> Self {
        Self::Csv { path: path.into(), source }
    }

    pub(crate) fn xlsx(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Xlsx { path: path.into(), message: message.to_string() }
    }
}
