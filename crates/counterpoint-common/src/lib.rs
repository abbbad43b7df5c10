//! counterpoint-common: Shared types, errors, and cache-file helpers used across all Counterpoint crates.

pub mod error;
pub mod dataset;
pub mod cache_file;
pub mod progress;

// Re-export commonly used types
pub use cache_file::CacheState;
pub use dataset::{Dataset, DatasetRow};
pub use error::{CounterpointError, Result};
