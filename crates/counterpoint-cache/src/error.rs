//! Error types for the cache layer.

use counterpoint_common::CounterpointError;
use counterpoint_llm::LlmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] CounterpointError),

    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    #[error("Chunk at offset {offset} returned {got} vectors for {expected} texts")]
    ChunkMismatch { offset: usize, expected: usize, got: usize },

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),
}
