//! Scaleweave command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scaleweave::config::{expand_path, Config};
use scaleweave::dataset::{load_graph_store, missing_input};
use scaleweave::error::{ConfigError, DatasetError};
use scaleweave::orchestrator::{AlignmentPipeline, RunMode};
use scaleweave::{ArtifactStore, StructuralEncoder};

/// Iterative multi-scale entity alignment for temporal knowledge graphs.
#[derive(Parser, Debug)]
#[command(name = "scaleweave")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the graph pair input files
    #[arg(short, long)]
    data_dir: String,

    /// Path to a configuration file (defaults to <data-dir>/scaleweave.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Override the unaligned-pool floor
    #[arg(long)]
    min_kg1_entities: Option<usize>,

    /// Override candidates retrieved per scale
    #[arg(long)]
    top_k: Option<usize>,

    /// Override the encoder's epoch request
    #[arg(long)]
    epochs: Option<usize>,

    /// Override the encoder device selector
    #[arg(long)]
    device: Option<String>,

    /// Override the encoder's random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Load embeddings from the message pool instead of encoding
    #[arg(long)]
    skip_encoding: bool,

    /// Encode, write the embedding caches, and exit
    #[arg(long)]
    only_encoding: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mode = match (args.skip_encoding, args.only_encoding) {
        (true, true) => {
            return Err(ConfigError::ConflictingFlags(
                "--skip-encoding and --only-encoding cannot be combined".to_string(),
            )
            .into())
        }
        (true, false) => RunMode::SkipEncoding,
        (false, true) => RunMode::EncodeOnly,
        (false, false) => RunMode::Full,
    };

    let data_dir = expand_path(&args.data_dir);
    if let Some(missing) = missing_input(&data_dir) {
        return Err(DatasetError::MissingFile(missing).into());
    }

    let mut config = Config::load(args.config.as_deref(), &data_dir)?;
    if let Some(v) = args.max_iterations {
        config.orchestrator.max_iterations = v;
    }
    if let Some(v) = args.min_kg1_entities {
        config.orchestrator.min_kg1_entities = v;
    }
    if let Some(v) = args.top_k {
        config.retrieval.top_k = v;
    }
    if let Some(v) = args.epochs {
        config.encoder.epochs = v;
    }
    if let Some(v) = args.device {
        config.encoder.device = v;
    }
    if let Some(v) = args.seed {
        config.encoder.seed = v;
    }
    config.validate()?;

    let store = load_graph_store(&data_dir)?;
    let artifacts = ArtifactStore::open(&data_dir)?;
    let backend = Box::new(StructuralEncoder::new(&config.encoder));
    let pipeline = AlignmentPipeline::new(config, store, artifacts, backend, mode);
    let report = pipeline.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "aligned {} pairs in {} iteration(s), {} source entities unaligned ({:?})",
            report.seed_count, report.iterations, report.pool_remaining, report.stop_reason
        );
    }
    Ok(())
}
