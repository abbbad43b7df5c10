//! Counterpoint: human vs. model reply comparison pipeline.
//! Entry point for the `counterpoint` binary.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use counterpoint_common::Dataset;
use counterpoint_llm::{LlmBackend, ServiceDescriptor, ServiceRegistry};
use counterpoint_pipeline::{PrepareOptions, ReplyGenerationPipeline, ReplyStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "counterpoint")]
#[command(version)]
#[command(about = "Compare human and model-generated answers across LLM backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "COUNTERPOINT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep rows with enough human answers and drop those the safety check rejects
    Prepare {
        /// Input dataset (JSON array or .jsonl)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Descriptor file (in the services directory) of the backend doing the safety check
        #[arg(short, long)]
        service: String,

        /// Exclusion cache file
        #[arg(long)]
        exclusions: Option<PathBuf>,

        /// Where to write the filtered dataset
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the computed exclusions to the cache file
        #[arg(long)]
        persist_exclusions: bool,
    },

    /// Embed every question of a dataset
    EmbedQuestions {
        #[arg(short, long)]
        dataset: PathBuf,

        /// Descriptor file of the embedding backend
        #[arg(short, long)]
        service: String,

        /// Embedding cache file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate replies from every backend in the manifest
    Replies {
        #[arg(short, long)]
        dataset: PathBuf,

        /// Service manifest (defaults to the configured one)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Reply cache file
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Where to write the dataset with response columns
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Embed every stored reply
    EmbedReplies {
        /// Reply cache file
        #[arg(short, long)]
        replies: Option<PathBuf>,

        /// Descriptor file of the embedding backend
        #[arg(short, long)]
        service: String,

        /// Reply embedding cache file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load the manifest and list the backends it defines
    CheckServices {
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

fn load_service(config: &Config, descriptor: &str) -> Result<Arc<dyn LlmBackend>> {
    let dir = &config.services.dir;
    let service = ServiceDescriptor::from_file(dir, descriptor)
        .and_then(|d| d.build(dir, &config.generation.backend_options()))
        .with_context(|| format!("loading service {}", dir.join(descriptor).display()))?;
    Ok(service)
}

fn load_registry(config: &Config, manifest: Option<PathBuf>) -> Result<ServiceRegistry> {
    let manifest = manifest.unwrap_or_else(|| config.services.manifest.clone());
    ServiceRegistry::load_with(&manifest, &config.generation.backend_options())
        .with_context(|| format!("loading service manifest {}", manifest.display()))
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    Dataset::load(path).with_context(|| format!("loading dataset {}", path.display()))
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Prepare { dataset, service, exclusions, output, persist_exclusions } => {
            let dataset = load_dataset(&dataset)?;
            let backend = load_service(&config, &service)?;
            let exclusions = exclusions.unwrap_or_else(|| config.paths.exclusions_for(&service));
            let options = PrepareOptions {
                min_human_answers: config.dataset.min_human_answers,
                persist_exclusions,
            };

            let prepared = counterpoint_pipeline::prepare(&dataset, backend.as_ref(), &exclusions, &options).await?;
            let output = output.unwrap_or_else(|| config.paths.prepared_dataset());
            prepared.dataset.save(&output)?;
            info!(
                input = prepared.input_rows,
                eligible = prepared.eligible_rows,
                excluded = prepared.excluded.len(),
                kept = prepared.dataset.len(),
                path = %output.display(),
                "prepared dataset written"
            );
        }

        Commands::EmbedQuestions { dataset, service, output } => {
            let dataset = load_dataset(&dataset)?;
            let backend = load_service(&config, &service)?;
            let output = output.unwrap_or_else(|| config.paths.question_embeddings_for(&service));
            let vectors = counterpoint_cache::embed_questions(
                backend.as_ref(),
                &dataset,
                &output,
                config.embedding.chunk_size,
            )
            .await?;
            info!(vectors = vectors.len(), path = %output.display(), "question embeddings ready");
        }

        Commands::Replies { dataset, manifest, cache, output } => {
            let dataset = load_dataset(&dataset)?;
            let registry = load_registry(&config, manifest)?;
            let cache = cache.unwrap_or_else(|| config.paths.replies_cache());
            let pipeline = ReplyGenerationPipeline::new(
                config.generation.max_output_tokens,
                config.generation.replies_per_question,
            );

            let run = pipeline.run(&dataset, &registry, &cache).await?;
            for policy in &run.report.policies {
                info!(
                    run_id = %run.report.run_id,
                    policy = %policy.policy,
                    skipped = policy.skipped,
                    rows = policy.rows,
                    failed_rows = policy.failed_rows,
                    elapsed_secs = policy.elapsed.as_secs_f64(),
                    "policy summary"
                );
            }

            let output = output.unwrap_or_else(|| config.paths.augmented_dataset());
            counterpoint_pipeline::augment(&dataset, &run.store).save(&output)?;
            info!(path = %output.display(), "dataset with responses written");
        }

        Commands::EmbedReplies { replies, service, output } => {
            let replies = replies.unwrap_or_else(|| config.paths.replies_cache());
            let store = ReplyStore::load(&replies)?
                .into_option()
                .with_context(|| format!("no reply cache at {}; run `counterpoint replies` first", replies.display()))?;
            let backend = load_service(&config, &service)?;
            let output = output.unwrap_or_else(|| config.paths.reply_embeddings_for(&service));

            let embeddings = counterpoint_pipeline::embed_replies(backend.as_ref(), &store, &output).await?;
            info!(policies = embeddings.len(), path = %output.display(), "reply embeddings ready");
        }

        Commands::CheckServices { manifest } => {
            let registry = load_registry(&config, manifest)?;
            for (name, backend) in registry.iter() {
                let kind = if backend.is_local() { "local" } else { "hosted" };
                println!("{name}\t{kind}\t{}", backend.model_id());
            }
            info!(services = registry.len(), "manifest ok");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("counterpoint=debug,info")),
        )
        .init();

    run(Cli::parse()).await
}
