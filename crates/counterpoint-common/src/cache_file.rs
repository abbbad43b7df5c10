//! Wholesale cache files keyed by a caller-chosen path.
//!
//! A cache file is either absent or complete. Presence is trusted without
//! validating the content against the current inputs; staleness is the
//! caller's problem. Writes go through a sibling temp file and a rename so
//! an interrupted write never leaves a truncated file behind that a later
//! run would treat as complete.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{CounterpointError, Result};

const TEMP_SUFFIX: &str = "tmp";

/// Result of probing a cache path.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState<T> {
    /// Nothing at the path; the caller must compute.
    Absent,
    /// The file exists and was loaded verbatim.
    Complete(T),
}

impl<T: DeserializeOwned> CacheState<T> {
    /// Loads the JSON file at `path` if it exists.
    pub fn probe(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "cache absent");
            return Ok(Self::Absent);
        }
        debug!(path = %path.display(), "cache present, loading");
        read_json(path).map(Self::Complete)
    }
}

impl<T> CacheState<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Absent => None,
            Self::Complete(value) => Some(value),
        }
    }
}

/// Reads a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| CounterpointError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CounterpointError::serialization(path, e))
}

/// Writes `value` as compact JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer(&mut *writer, value)
            .map_err(|e| CounterpointError::serialization(path, e))
    })
}

/// Writes `value` as indented JSON to `path`, creating parent directories.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)
            .map_err(|e| CounterpointError::serialization(path, e))
    })
}

/// Writes raw bytes to `path`, creating parent directories.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, |writer| {
        writer
            .write_all(bytes)
            .map_err(|e| CounterpointError::io(path, e))
    })
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| CounterpointError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CounterpointError::io(parent, e))?;
    }

    let temp = temp_path(path);
    {
        let file = File::create(&temp).map_err(|e| CounterpointError::io(&temp, e))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush().map_err(|e| CounterpointError::io(&temp, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| CounterpointError::io(&temp, e))?;
    }
    fs::rename(&temp, path).map_err(|e| CounterpointError::io(path, e))?;

    debug!(path = %path.display(), "cache file written");
    Ok(())
}
