//! counterpoint-pipeline: the multi-step flows built on the backends and caches.
//!
//! - `prepare`: minimum-answer filter plus safety exclusions for one backend
//! - `generate`: N completions per question per registered backend, resumable per backend
//! - `augment`: dataset copy with one `<policy>_response` column per backend
//! - `reply_embeddings`: embeddings of every stored reply

pub mod augment;
pub mod error;
pub mod generate;
pub mod prepare;
pub mod replies;
pub mod reply_embeddings;

pub use augment::{augment, response_column};
pub use error::{PipelineError, Result};
pub use generate::{PolicyReport, ReplyGenerationPipeline, ReplyRun, RunReport};
pub use prepare::{prepare, PrepareOptions, PreparedDataset};
pub use replies::{replicate_answers, HumanRow, ModelRow, PolicyReplies, ReplyStore, HUMAN_POLICY};
pub use reply_embeddings::{embed_replies, EmbeddedRow, ReplyEmbeddings};
