//! counterpoint-llm: LLM backend abstraction layer.
//! Implements the LlmBackend trait, the hosted and local backends,
//! credential loading and the policy-name registry built from a manifest.

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod key;
pub mod registry;
pub mod retry;

pub use backend::{BackendOptions, LlmBackend, OllamaBackend, OpenAiBackend, SafetyVerdict};
pub use descriptor::{BackendKind, ServiceDescriptor};
pub use error::{ErrorKind, LlmError, Result};
pub use key::{EnvKeyLoader, FileKeyLoader, KeyLoader};
pub use registry::ServiceRegistry;
pub use retry::RetryPolicy;
