use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterpointError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error in {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot error in {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error("Dataset error: {0}")]
    Dataset(String),
}

impl CounterpointError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, CounterpointError>;
