//! Safety-exclusion cache: ids of rows whose question the backend refuses.
//!
//! `rows_to_remove` only reads the cache; it never writes it. Persisting a
//! freshly computed list is the separate `persist_exclusions` step, so a
//! caller that skips it recomputes the list on every run.

use std::path::Path;

use counterpoint_common::{cache_file, progress, CacheState, Dataset};
use counterpoint_llm::LlmBackend;
use tracing::{debug, info};

use crate::error::Result;

/// Returns the ids of rows whose question `backend.check` rejects, in dataset order.
///
/// An existing file at `cache_path` is returned as-is with no backend calls
/// and no check that its ids belong to `dataset`.
pub async fn rows_to_remove(
    dataset: &Dataset,
    cache_path: &Path,
    backend: &dyn LlmBackend,
) -> Result<Vec<u64>> {
    if let CacheState::Complete(ids) = CacheState::<Vec<u64>>::probe(cache_path)? {
        info!(path = %cache_path.display(), excluded = ids.len(), "safety exclusions loaded from cache");
        return Ok(ids);
    }

    let pb = progress::progress_bar(dataset.len(), "safety check");
    let mut excluded = Vec::new();
    for row in dataset {
        let verdict = backend.check(&row.question).await?;
        if !verdict.accepted {
            debug!(row = row.id, detail = ?verdict.detail, "row rejected by safety check");
            excluded.push(row.id);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        model = backend.model_id(),
        rows = dataset.len(),
        excluded = excluded.len(),
        "safety check complete"
    );
    Ok(excluded)
}

/// Writes the exclusion list as a JSON array of ids.
pub fn persist_exclusions(cache_path: &Path, ids: &[u64]) -> Result<()> {
    cache_file::write_json(cache_path, ids)?;
    Ok(())
}

pub fn load_exclusions(cache_path: &Path) -> Result<Vec<u64>> {
    Ok(cache_file::read_json(cache_path)?)
}
