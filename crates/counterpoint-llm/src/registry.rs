//! Service registry: policy name → backend, built from a manifest.
//!
//! Manifest format (JSON object, one entry per policy):
//!
//! ```json
//! {
//!   "gpt":   {"filename": "gpt35.json", "where": "services"},
//!   "llama": {"model": "tinyllama:latest"}
//! }
//! ```
//!
//! `{filename, where}` loads the descriptor file `where/filename` (`where`
//! is used as written, so a relative value resolves against the working
//! directory). `{model}` builds a local backend directly. Entries of any
//! other shape are skipped. Iteration order is manifest order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::backend::{BackendOptions, LlmBackend};
use crate::descriptor::ServiceDescriptor;
use crate::error::{LlmError, Result};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestEntry {
    // Listed first so an entry carrying both shapes resolves as a file.
    File {
        filename: String,
        #[serde(rename = "where")]
        location: PathBuf,
    },
    Model {
        model: String,
    },
}

/// Ordered collection of named backends.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<(String, Arc<dyn LlmBackend>)>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `name`. A replaced entry keeps its original position.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn LlmBackend>) {
        let name = name.into();
        match self.services.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = backend,
            None => self.services.push((name, backend)),
        }
    }

    pub fn from_services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn LlmBackend>)>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for (name, backend) in services {
            registry.register(name, backend);
        }
        registry
    }

    /// Loads the manifest at `path` with default backend options.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, &BackendOptions::default())
    }

    pub fn load_with(path: &Path, options: &BackendOptions) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LlmError::ConfigInvalid(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        let manifest: Map<String, Value> = serde_json::from_str(&text).map_err(|e| {
            LlmError::ConfigInvalid(format!("invalid manifest {}: {e}", path.display()))
        })?;

        let mut registry = Self::new();
        for (name, value) in manifest {
            let backend = match serde_json::from_value::<ManifestEntry>(value) {
                Ok(ManifestEntry::File { filename, location }) => {
                    ServiceDescriptor::from_file(&location, &filename)?.build(&location, options)?
                }
                Ok(ManifestEntry::Model { model }) => {
                    ServiceDescriptor::local(model).build(Path::new("."), options)?
                }
                Err(_) => {
                    debug!(policy = %name, "manifest entry has no recognised shape, skipped");
                    continue;
                }
            };
            registry.register(name, backend);
        }

        info!(path = %path.display(), services = registry.len(), "service registry loaded");
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn LlmBackend>> {
        self.services.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn LlmBackend>)> {
        self.services.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
