//! Configuration loading for Counterpoint.
//! Reads counterpoint.toml from the path given on the command line,
//! the COUNTERPOINT_CONFIG env var, or the current directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use counterpoint_llm::{BackendOptions, RetryPolicy};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "counterpoint.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Directory holding per-service descriptor files.
    #[serde(default = "default_services_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

fn default_services_dir() -> PathBuf { PathBuf::from("resources/services") }
fn default_manifest()     -> PathBuf { PathBuf::from("resources/replies/services.json") }

impl Default for ServicesConfig {
    fn default() -> Self {
        Self { dir: default_services_dir(), manifest: default_manifest() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_replies_per_question")]
    pub replies_per_question: usize,
    /// Cap on requests for a hosted completion that keeps returning no
    /// content. Absent means retry forever.
    #[serde(default)]
    pub max_empty_retries: Option<u32>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_output_tokens()    -> u32   { 250 }
fn default_replies_per_question() -> usize { 3 }
fn default_request_timeout()      -> u64   { 120 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
            replies_per_question: default_replies_per_question(),
            max_empty_retries: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            retry: RetryPolicy::from_cap(self.max_empty_retries),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize { counterpoint_cache::EMBED_CHUNK_SIZE }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { chunk_size: default_chunk_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_min_human_answers")]
    pub min_human_answers: usize,
}

fn default_min_human_answers() -> usize { 3 }

impl Default for DatasetConfig {
    fn default() -> Self {
        Self { min_human_answers: default_min_human_answers() }
    }
}

/// Root for the default cache and output locations used by the subcommands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf { PathBuf::from("resources") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl PathsConfig {
    /// `<data_dir>/filtered/rows_to_remove_<service>.json`
    pub fn exclusions_for(&self, service: &str) -> PathBuf {
        self.data_dir.join("filtered").join(format!("rows_to_remove_{}.json", stem(service)))
    }

    pub fn prepared_dataset(&self) -> PathBuf {
        self.data_dir.join("filtered").join("dataset_humans.json")
    }

    pub fn replies_cache(&self) -> PathBuf {
        self.data_dir.join("replies").join("data.json")
    }

    pub fn augmented_dataset(&self) -> PathBuf {
        self.data_dir.join("datasets").join("dataset_with_llm_responses.json")
    }

    pub fn question_embeddings_for(&self, service: &str) -> PathBuf {
        self.data_dir.join("embeddings").join(format!("questions-{}.json", stem(service)))
    }

    pub fn reply_embeddings_for(&self, service: &str) -> PathBuf {
        self.data_dir.join("embeddings").join(format!("replies-{}.json", stem(service)))
    }
}

/// Descriptor file name without its extension.
fn stem(service: &str) -> String {
    Path::new(service)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| service.to_string())
}

mod tests;

impl Config {
    /// Loads `path`. A missing file yields the defaults with a warning.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "config file not found, using defaults (copy counterpoint.example.toml to counterpoint.toml to customise)"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
