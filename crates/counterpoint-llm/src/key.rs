//! Credential sources for hosted backends.
//!
//! A loader is consulted once, when the backend is built; the resolved
//! secret is held by the backend for its lifetime.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::{LlmError, Result};

pub trait KeyLoader: Send + Sync {
    /// Returns the credential or `CredentialUnavailable`.
    fn key(&self) -> Result<SecretString>;
}

/// Reads the whole file as the credential. No trimming or parsing: a
/// trailing newline in the file is part of the key.
#[derive(Debug, Clone)]
pub struct FileKeyLoader {
    path: PathBuf,
}

impl FileKeyLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyLoader for FileKeyLoader {
    fn key(&self) -> Result<SecretString> {
        std::fs::read_to_string(&self.path)
            .map(SecretString::from)
            .map_err(|e| LlmError::CredentialUnavailable {
                origin: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

/// Reads the credential from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyLoader {
    var: String,
}

impl EnvKeyLoader {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyLoader for EnvKeyLoader {
    fn key(&self) -> Result<SecretString> {
        std::env::var(&self.var)
            .map(SecretString::from)
            .map_err(|e| LlmError::CredentialUnavailable {
                origin: format!("${}", self.var),
                reason: e.to_string(),
            })
    }
}
