//! Dataset preparation: answer-count filter followed by safety exclusions.

use std::path::Path;

use counterpoint_cache::{persist_exclusions, rows_to_remove};
use counterpoint_common::Dataset;
use counterpoint_llm::LlmBackend;
use tracing::info;

use crate::error::Result;

pub const DEFAULT_MIN_HUMAN_ANSWERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareOptions {
    pub min_human_answers: usize,
    /// Write freshly computed exclusions to the cache path. Off by default,
    /// in which case the exclusions are recomputed on every run.
    pub persist_exclusions: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self { min_human_answers: DEFAULT_MIN_HUMAN_ANSWERS, persist_exclusions: false }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub dataset: Dataset,
    pub input_rows: usize,
    /// Rows left after the answer-count filter.
    pub eligible_rows: usize,
    /// Ids returned by the safety check (or its cache).
    pub excluded: Vec<u64>,
}

pub async fn prepare(
    dataset: &Dataset,
    backend: &dyn LlmBackend,
    exclusion_cache: &Path,
    options: &PrepareOptions,
) -> Result<PreparedDataset> {
    let eligible = dataset.with_min_human_answers(options.min_human_answers);
    info!(
        rows = dataset.len(),
        eligible = eligible.len(),
        min_human_answers = options.min_human_answers,
        "answer-count filter applied"
    );

    let cache_existed = exclusion_cache.exists();
    let excluded = rows_to_remove(&eligible, exclusion_cache, backend).await?;
    if options.persist_exclusions && !cache_existed {
        persist_exclusions(exclusion_cache, &excluded)?;
        info!(path = %exclusion_cache.display(), "safety exclusions persisted");
    }

    let filtered = eligible.without_ids(&excluded);
    info!(excluded = excluded.len(), remaining = filtered.len(), "safety exclusions applied");

    Ok(PreparedDataset {
        dataset: filtered,
        input_rows: dataset.len(),
        eligible_rows: eligible.len(),
        excluded,
    })
}
