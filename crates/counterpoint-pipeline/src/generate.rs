//! Reply generation across every registered backend.
//!
//! For each policy in registry order, every row's question is sent to
//! `complete` N times, one request at a time. A policy already present in
//! the loaded store is skipped, so an interrupted run resumes at backend
//! granularity. The store is written once, after the last backend.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use counterpoint_common::{progress, CacheState, Dataset};
use counterpoint_llm::{LlmBackend, ServiceRegistry};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::replies::{replicate_answers, HumanRow, ModelRow, ReplyStore, HUMAN_POLICY};

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 250;
pub const DEFAULT_REPLIES_PER_QUESTION: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyReport {
    pub policy: String,
    /// True when the policy was already in the store and nothing was called.
    pub skipped: bool,
    pub rows: usize,
    pub failed_rows: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub policies: Vec<PolicyReport>,
}

impl RunReport {
    pub fn policy(&self, name: &str) -> Option<&PolicyReport> {
        self.policies.iter().find(|p| p.policy == name)
    }
}

#[derive(Debug, Clone)]
pub struct ReplyRun {
    pub store: ReplyStore,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct ReplyGenerationPipeline {
    max_output_tokens: u32,
    replies_per_question: usize,
}

impl Default for ReplyGenerationPipeline {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            replies_per_question: DEFAULT_REPLIES_PER_QUESTION,
        }
    }
}

impl ReplyGenerationPipeline {
    pub fn new(max_output_tokens: u32, replies_per_question: usize) -> Self {
        Self { max_output_tokens, replies_per_question }
    }

    pub fn replies_per_question(&self) -> usize {
        self.replies_per_question
    }

    /// Runs every backend in `registry`, resuming from `cache_path`.
    ///
    /// With `replies_per_question == 0` no completion is requested: model
    /// rows hold empty reply lists and every human answer an empty group.
    pub async fn run(
        &self,
        dataset: &Dataset,
        registry: &ServiceRegistry,
        cache_path: &Path,
    ) -> Result<ReplyRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, rows = dataset.len(), services = registry.len(), "reply generation started");

        let mut store = match ReplyStore::load(cache_path)? {
            CacheState::Complete(store) => {
                info!(path = %cache_path.display(), policies = store.len(), "resuming from reply cache");
                store
            }
            CacheState::Absent => ReplyStore::new(),
        };

        let mut policies = Vec::with_capacity(registry.len());
        for (name, backend) in registry.iter() {
            if name == HUMAN_POLICY {
                warn!(policy = name, "policy name is reserved for human answers, skipped");
                continue;
            }
            if store.contains(name) {
                warn!(policy = name, "already done, skipped");
                policies.push(PolicyReport {
                    policy: name.to_string(),
                    skipped: true,
                    rows: store.get(name).map_or(0, |r| r.row_count()),
                    failed_rows: 0,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            let start = Instant::now();
            let (rows, failed_rows) = self.replies_for(name, backend.as_ref(), dataset).await;
            let report = PolicyReport {
                policy: name.to_string(),
                skipped: false,
                rows: rows.len(),
                failed_rows,
                elapsed: start.elapsed(),
            };
            info!(
                policy = name,
                rows = report.rows,
                failed_rows,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "policy done"
            );
            store.insert_model(name, rows);
            policies.push(report);
        }

        store.set_human(
            dataset
                .iter()
                .map(|row| HumanRow(row.id, replicate_answers(&row.human_answers, self.replies_per_question)))
                .collect(),
        );

        store.save(cache_path)?;
        info!(%run_id, path = %cache_path.display(), "reply cache written");

        Ok(ReplyRun { store, report: RunReport { run_id, started_at, policies } })
    }

    /// One row per dataset row. A row whose completion fails at any attempt
    /// keeps no replies; later rows are unaffected.
    async fn replies_for(
        &self,
        policy: &str,
        backend: &dyn LlmBackend,
        dataset: &Dataset,
    ) -> (Vec<ModelRow>, usize) {
        let pb = progress::progress_bar(dataset.len(), policy);
        let mut rows = Vec::with_capacity(dataset.len());
        let mut failed = 0;

        for row in dataset {
            let mut replies = Vec::with_capacity(self.replies_per_question);
            for attempt in 1..=self.replies_per_question {
                match backend.complete(&row.question, self.max_output_tokens).await {
                    Ok(reply) => replies.push(reply),
                    Err(e) => {
                        warn!(policy, row = row.id, attempt, error = %e, "completion failed, row dropped");
                        replies.clear();
                        failed += 1;
                        break;
                    }
                }
            }
            rows.push(ModelRow(row.id, replies));
            pb.inc(1);
        }
        pb.finish_and_clear();

        (rows, failed)
    }
}
