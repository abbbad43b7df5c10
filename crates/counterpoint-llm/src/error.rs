//! Error types for backend construction and backend calls.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Credential unavailable from {origin}: {reason}")]
    CredentialUnavailable { origin: String, reason: String },

    #[error("Invalid backend configuration: {0}")]
    ConfigInvalid(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No content returned after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The secret could not be read. Fatal, never retried.
    CredentialUnavailable,
    /// A descriptor or manifest is malformed. Fatal at load time.
    BackendConfigInvalid,
    /// A single request failed (transport, auth, rate limit, bad payload).
    BackendCallFailed,
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::CredentialUnavailable { .. } => ErrorKind::CredentialUnavailable,
            LlmError::ConfigInvalid(_) => ErrorKind::BackendConfigInvalid,
            LlmError::Http(_)
            | LlmError::Serde(_)
            | LlmError::ApiError { .. }
            | LlmError::MalformedResponse(_)
            | LlmError::RetriesExhausted { .. } => ErrorKind::BackendCallFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let cred = LlmError::CredentialUnavailable {
            origin: "key.txt".to_string(),
            reason: "missing".to_string(),
        };
        assert_eq!(cred.kind(), ErrorKind::CredentialUnavailable);
        assert_eq!(LlmError::ConfigInvalid("x".into()).kind(), ErrorKind::BackendConfigInvalid);
        assert_eq!(
            LlmError::ApiError { status: 429, message: "slow down".into() }.kind(),
            ErrorKind::BackendCallFailed
        );
        assert_eq!(LlmError::RetriesExhausted { attempts: 3 }.kind(), ErrorKind::BackendCallFailed);
    }
}
