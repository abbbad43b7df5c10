//! counterpoint-cache: read-or-compute caches backed by a single file each.
//!
//! Both caches follow the same rule: if the cache file exists its content is
//! returned as-is and no backend call is made; otherwise the full result is
//! computed sequentially and, where the operation persists at all, written
//! once at the end.

pub mod batch;
pub mod embedding;
pub mod error;
pub mod safety;

pub use embedding::{embed_all, embed_all_chunked, embed_questions, EMBED_CHUNK_SIZE};
pub use error::{CacheError, Result};
pub use safety::{load_exclusions, persist_exclusions, rows_to_remove};
