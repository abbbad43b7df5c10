//! Chunked embedding cache.
//!
//! Texts are sent to `embed_many` in chunks and the vectors concatenated in
//! input order. The result is written once, after the last chunk: an error
//! (or a crash) part way through leaves no file, and the next run starts
//! from the first chunk again.

use std::path::Path;

use counterpoint_common::{cache_file, progress, CacheState, Dataset};
use counterpoint_llm::LlmBackend;
use tracing::{debug, info};

use crate::batch::BatchIterator;
use crate::error::{CacheError, Result};

pub const EMBED_CHUNK_SIZE: usize = 100;

/// Embeds `texts` in chunks of [`EMBED_CHUNK_SIZE`], or loads `cache_path` if present.
pub async fn embed_all(
    backend: &dyn LlmBackend,
    texts: &[String],
    cache_path: &Path,
) -> Result<Vec<Vec<f64>>> {
    embed_all_chunked(backend, texts, cache_path, EMBED_CHUNK_SIZE).await
}

pub async fn embed_all_chunked(
    backend: &dyn LlmBackend,
    texts: &[String],
    cache_path: &Path,
    chunk_size: usize,
) -> Result<Vec<Vec<f64>>> {
    if let CacheState::Complete(vectors) = CacheState::<Vec<Vec<f64>>>::probe(cache_path)? {
        info!(path = %cache_path.display(), vectors = vectors.len(), "embeddings loaded from cache");
        return Ok(vectors);
    }

    let batches = BatchIterator::new(texts, chunk_size)?;
    let pb = progress::progress_bar(texts.len(), "embedding");
    let mut vectors = Vec::with_capacity(texts.len());
    for (offset, chunk) in batches {
        let embedded = backend.embed_many(chunk).await?;
        if embedded.len() != chunk.len() {
            return Err(CacheError::ChunkMismatch {
                offset,
                expected: chunk.len(),
                got: embedded.len(),
            });
        }
        debug!(offset, size = chunk.len(), "chunk embedded");
        vectors.extend(embedded);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    cache_file::write_json(cache_path, &vectors)?;
    info!(
        model = backend.model_id(),
        path = %cache_path.display(),
        vectors = vectors.len(),
        "embeddings computed and cached"
    );
    Ok(vectors)
}

/// Embeds every question of `dataset`, in row order.
pub async fn embed_questions(
    backend: &dyn LlmBackend,
    dataset: &Dataset,
    cache_path: &Path,
    chunk_size: usize,
) -> Result<Vec<Vec<f64>>> {
    embed_all_chunked(backend, &dataset.questions(), cache_path, chunk_size).await
}
