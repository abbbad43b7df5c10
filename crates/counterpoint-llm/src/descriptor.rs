//! Per-service descriptor files.
//!
//! A descriptor names the backend variant in its `type` field:
//!
//! ```json
//! {"type": "OpenAi", "keyfile": "azure.key", "endpoint": "https://x.openai.azure.com",
//!  "deployment": "gpt35", "version": "2024-02-01", "model": "gpt-35-turbo"}
//! {"type": "Ollama", "model": "tinyllama:latest"}
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{default_ollama_url, BackendOptions, LlmBackend, OllamaBackend, OpenAiBackend};
use crate::error::{LlmError, Result};
use crate::key::{EnvKeyLoader, FileKeyLoader, KeyLoader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Hosted,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServiceDescriptor {
    OpenAi(HostedDescriptor),
    Ollama(LocalDescriptor),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedDescriptor {
    /// Credential file, relative to the descriptor's directory unless absolute.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
    /// Environment variable holding the credential, used when `keyfile` is absent.
    #[serde(default)]
    pub keyenv: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDescriptor {
    #[serde(default)]
    pub endpoint: Option<String>,
    pub model: String,
}

impl ServiceDescriptor {
    /// Shorthand for a local descriptor with the default daemon address.
    pub fn local(model: impl Into<String>) -> Self {
        ServiceDescriptor::Ollama(LocalDescriptor { endpoint: None, model: model.into() })
    }

    /// Reads `dir/filename`. A file that does not parse is `BackendConfigInvalid`.
    pub fn from_file(dir: &Path, filename: &str) -> Result<Self> {
        let path = dir.join(filename);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            LlmError::ConfigInvalid(format!("cannot read descriptor {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            LlmError::ConfigInvalid(format!("invalid descriptor {}: {e}", path.display()))
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            ServiceDescriptor::OpenAi(_) => BackendKind::Hosted,
            ServiceDescriptor::Ollama(_) => BackendKind::Local,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ServiceDescriptor::OpenAi(d) => &d.model,
            ServiceDescriptor::Ollama(d) => &d.model,
        }
    }

    /// Hosted descriptors need a credential source plus endpoint, deployment
    /// and version. Local descriptors need only a model.
    pub fn validate(&self) -> Result<()> {
        if self.model().trim().is_empty() {
            return Err(LlmError::ConfigInvalid("descriptor has an empty model".into()));
        }
        let ServiceDescriptor::OpenAi(hosted) = self else {
            return Ok(());
        };
        if hosted.keyfile.is_none() && hosted.keyenv.is_none() {
            return Err(LlmError::ConfigInvalid(format!(
                "hosted descriptor for {} has neither keyfile nor keyenv",
                hosted.model
            )));
        }
        let missing: Vec<&str> = [
            ("endpoint", &hosted.endpoint),
            ("deployment", &hosted.deployment),
            ("version", &hosted.version),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(LlmError::ConfigInvalid(format!(
                "hosted descriptor for {} is missing {}",
                hosted.model,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Builds the backend. `dir` anchors a relative `keyfile`; the
    /// credential is read here, once.
    pub fn build(&self, dir: &Path, options: &BackendOptions) -> Result<Arc<dyn LlmBackend>> {
        self.validate()?;
        match self {
            ServiceDescriptor::OpenAi(hosted) => {
                let loader: Box<dyn KeyLoader> = match (&hosted.keyfile, &hosted.keyenv) {
                    (Some(file), _) => Box::new(FileKeyLoader::new(dir.join(file))),
                    (None, Some(var)) => Box::new(EnvKeyLoader::new(var.clone())),
                    (None, None) => {
                        return Err(LlmError::ConfigInvalid("no credential source".into()))
                    }
                };
                let backend = OpenAiBackend::from_loader(
                    loader.as_ref(),
                    hosted.endpoint.clone().unwrap_or_default(),
                    hosted.deployment.clone().unwrap_or_default(),
                    hosted.version.clone().unwrap_or_default(),
                    hosted.model.clone(),
                )?
                .with_options(options)?;
                debug!(model = %hosted.model, deployment = %backend.deployment, "hosted backend built");
                Ok(Arc::new(backend))
            }
            ServiceDescriptor::Ollama(local) => {
                let base = local.endpoint.clone().unwrap_or_else(default_ollama_url);
                let backend = OllamaBackend::new(base, local.model.clone()).with_options(options)?;
                debug!(model = %local.model, base_url = %backend.base_url, "local backend built");
                Ok(Arc::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_parse_hosted_descriptor() {
        let d: ServiceDescriptor = serde_json::from_str(
            r#"{"type": "OpenAi", "keyfile": "k.txt", "endpoint": "https://e",
                "deployment": "dep", "version": "2024-02-01", "model": "gpt-35-turbo"}"#,
        )
        .unwrap();
        assert_eq!(d.kind(), BackendKind::Hosted);
        assert_eq!(d.model(), "gpt-35-turbo");
        d.validate().unwrap();
    }

    #[test]
    fn test_hosted_missing_fields_is_config_invalid() {
        let d: ServiceDescriptor =
            serde_json::from_str(r#"{"type": "OpenAi", "keyfile": "k.txt", "model": "m"}"#).unwrap();
        let err = d.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendConfigInvalid);
        assert!(err.to_string().contains("endpoint, deployment, version"));
    }

    #[test]
    fn test_unknown_type_is_config_invalid() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("x.json"), r#"{"type": "Gemini", "model": "m"}"#).unwrap();
        let err = ServiceDescriptor::from_file(dir.path(), "x.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendConfigInvalid);
    }

    #[test]
    fn test_build_local_needs_only_model() {
        let backend = ServiceDescriptor::local("tinyllama:latest")
            .build(Path::new("."), &BackendOptions::default())
            .unwrap();
        assert!(backend.is_local());
        assert_eq!(backend.model_id(), "tinyllama:latest");
    }

    #[test]
    fn test_build_hosted_resolves_keyfile_next_to_descriptor() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("azure.key"), "secret").unwrap();
        std::fs::write(
            dir.path().join("gpt.json"),
            r#"{"type": "OpenAi", "keyfile": "azure.key", "endpoint": "https://e",
                "deployment": "dep", "version": "v1", "model": "gpt-35-turbo"}"#,
        )
        .unwrap();

        let backend = ServiceDescriptor::from_file(dir.path(), "gpt.json")
            .unwrap()
            .build(dir.path(), &BackendOptions::default())
            .unwrap();
        assert!(!backend.is_local());
    }

    #[test]
    fn test_build_hosted_missing_keyfile_is_credential_unavailable() {
        let dir = tempdir().unwrap();
        let d: ServiceDescriptor = serde_json::from_str(
            r#"{"type": "OpenAi", "keyfile": "absent.key", "endpoint": "https://e",
                "deployment": "dep", "version": "v1", "model": "m"}"#,
        )
        .unwrap();
        let err = d.build(dir.path(), &BackendOptions::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
    }
}
