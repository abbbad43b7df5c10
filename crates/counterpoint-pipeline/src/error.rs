//! Error types for the pipeline flows.

use counterpoint_cache::CacheError;
use counterpoint_common::CounterpointError;
use counterpoint_llm::LlmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] CounterpointError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),
}
