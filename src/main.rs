//! opd: on-policy distillation reward hook
//!
//! Subcommands:
//!
//! - `score`    -- Query the teacher for a batch of samples and extract
//!                 teacher log-probs (both stages)
//! - `extract`  -- Extract teacher log-probs from already stored responses
//! - `payload`  -- Print the teacher request for one sample

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use opd::config::OpdConfig;
use opd::reward::RewardHook;
use opd::rollout::score_samples;
use opd::sample::Sample;
use opd::teacher::TeacherResponse;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// On-policy distillation reward hook.
#[derive(Parser)]
#[command(name = "opd", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Teacher endpoint URL (overrides config and environment).
    #[arg(long, global = true)]
    rm_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the teacher for every sample, then extract teacher log-probs.
    Score {
        /// JSON array of samples.
        #[arg(long, default_value = "data/samples.json")]
        samples: PathBuf,

        /// Where to write the annotated samples and scalar rewards.
        #[arg(long, default_value = "data/scored.json")]
        output: PathBuf,
    },

    /// Extract teacher log-probs without querying the teacher.
    Extract {
        /// JSON array of samples. Without `--responses`, each sample must
        /// carry its stored teacher response.
        #[arg(long, default_value = "data/samples.json")]
        samples: PathBuf,

        /// JSON array of teacher responses, one per sample in the same order.
        #[arg(long)]
        responses: Option<PathBuf>,

        #[arg(long, default_value = "data/scored.json")]
        output: PathBuf,
    },

    /// Print the teacher request body for one sample.
    Payload {
        #[arg(long, default_value = "data/samples.json")]
        samples: PathBuf,

        /// Zero-based index of the sample.
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

/// What `score` and `extract` write out.
#[derive(Serialize, Deserialize)]
struct ScoredBatch {
    samples: Vec<Sample>,
    raw_rewards: Vec<f64>,
    advantage_rewards: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => OpdConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OpdConfig::default(),
    };
    config.apply_env();
    if let Some(url) = cli.rm_url {
        config.teacher.rm_url = url;
    }
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Score { samples, output } => cmd_score(&config, &samples, &output).await,
        Commands::Extract {
            samples,
            responses,
            output,
        } => cmd_extract(&config, &samples, responses.as_deref(), &output),
        Commands::Payload { samples, index } => cmd_payload(&config, &samples, index),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_score(config: &OpdConfig, samples_path: &Path, output: &Path) -> Result<()> {
    let mut samples: Vec<Sample> = read_json(samples_path)?;
    tracing::info!(count = samples.len(), url = %config.teacher.rm_url, "Scoring samples");

    let hook = RewardHook::from_config(config);
    score_samples(&hook, &mut samples, config.rollout.max_concurrency)
        .await
        .context("Teacher scoring failed")?;

    let (raw_rewards, advantage_rewards) = hook
        .post_process_rewards(&mut samples)
        .context("Failed to extract teacher log-probs")?;

    write_batch(
        output,
        &ScoredBatch {
            samples,
            raw_rewards,
            advantage_rewards,
        },
    )
}

fn cmd_extract(
    config: &OpdConfig,
    samples_path: &Path,
    responses_path: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let mut samples: Vec<Sample> = read_json(samples_path)?;
    let hook = RewardHook::from_config(config);

    let (raw_rewards, advantage_rewards) = match responses_path {
        Some(path) => {
            let responses: Vec<TeacherResponse> = read_json(path)?;
            hook.post_process_responses(&responses, &mut samples)
        }
        None => hook.post_process_rewards(&mut samples),
    }
    .context("Failed to extract teacher log-probs")?;

    write_batch(
        output,
        &ScoredBatch {
            samples,
            raw_rewards,
            advantage_rewards,
        },
    )
}

fn cmd_payload(config: &OpdConfig, samples_path: &Path, index: usize) -> Result<()> {
    let samples: Vec<Sample> = read_json(samples_path)?;
    let sample = samples.get(index).with_context(|| {
        format!(
            "Sample index {index} out of range ({} samples in {})",
            samples.len(),
            samples_path.display()
        )
    })?;

    let hook = RewardHook::from_config(config);
    let request = hook.client().build_request(sample)?;
    println!("POST {}", hook.client().url());
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_batch(path: &Path, batch: &ScoredBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(batch)?;
    std::fs::write(path, json)?;

    tracing::info!(
        path = %path.display(),
        count = batch.samples.len(),
        "Saved scored samples"
    );
    Ok(())
}
